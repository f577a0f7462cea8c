//! Database Integration Tests
//!
//! Require `DATABASE_URL` pointing at a disposable `PostgreSQL` server.
//! Run with `cargo test -- --ignored`.

#[cfg(test)]
mod postgres_tests {
    use super::super::*;
    use chrono::{Duration, NaiveDate, Utc};
    use sqlx::PgPool;

    use crate::permissions::{cascade, LodgePermissions, OfficerRoleCode};

    async fn new_user(pool: &PgPool, username: &str) -> User {
        let email = format!("{username}@example.org");
        let mut tx = pool.begin().await.expect("begin");
        let user = insert_user(
            &mut tx,
            &NewUser {
                username,
                email: &email,
                password_hash: "hash",
                degree: 1,
                ..NewUser::default()
            },
        )
        .await
        .expect("insert user");
        cascade::on_user_created(&mut tx, user.id)
            .await
            .expect("cascade");
        tx.commit().await.expect("commit");
        find_user_by_id(pool, user.id)
            .await
            .expect("query")
            .expect("user exists")
    }

    // ========================================================================
    // User Tests
    // ========================================================================

    #[sqlx::test]
    #[ignore]
    async fn test_create_and_find_user(pool: PgPool) {
        let user = new_user(&pool, "aprendiz").await;
        assert_eq!(user.degree, 1);
        assert!(user.is_active);
        assert_eq!(user.permissions, LodgePermissions::BASIC);

        let found = find_user_by_username(&pool, "aprendiz")
            .await
            .expect("query")
            .expect("user");
        assert_eq!(found.id, user.id);

        let found = find_user_by_email(&pool, "APRENDIZ@example.org")
            .await
            .expect("query")
            .expect("user");
        assert_eq!(found.id, user.id);

        let profile_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM member_profiles WHERE user_id = $1)")
                .bind(user.id)
                .fetch_one(&pool)
                .await
                .expect("query");
        assert!(profile_exists);
    }

    #[sqlx::test]
    #[ignore]
    async fn test_username_and_email_exists(pool: PgPool) {
        let user = new_user(&pool, "companero").await;

        assert!(username_exists(&pool, "companero", None).await.unwrap());
        assert!(!username_exists(&pool, "companero", Some(user.id)).await.unwrap());
        assert!(email_exists(&pool, "companero@example.org", None).await.unwrap());
        assert!(!email_exists(&pool, "otro@example.org", None).await.unwrap());
    }

    // ========================================================================
    // Officer Role Tests
    // ========================================================================

    #[sqlx::test]
    #[ignore]
    async fn test_officer_role_cascade_is_additive(pool: PgPool) {
        let user = new_user(&pool, "tesorero").await;
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        let mut tx = pool.begin().await.unwrap();
        upsert_officer_role(&mut tx, user.id, OfficerRoleCode::Tes, start, None, true)
            .await
            .unwrap();
        cascade::on_officer_role_saved(&mut tx, user.id, OfficerRoleCode::Tes, true)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(find_user_groups(&pool, user.id).await.unwrap(), vec!["Tesorero"]);
        assert_eq!(
            find_active_officer_role(&pool, user.id).await.unwrap(),
            Some(OfficerRoleCode::Tes)
        );

        let mut tx = pool.begin().await.unwrap();
        upsert_officer_role(&mut tx, user.id, OfficerRoleCode::Sec, start, None, true)
            .await
            .unwrap();
        cascade::on_officer_role_saved(&mut tx, user.id, OfficerRoleCode::Sec, true)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(find_user_groups(&pool, user.id).await.unwrap(), vec!["Secretario"]);
        let user = find_user_by_id(&pool, user.id).await.unwrap().unwrap();
        assert!(user.permissions.has(LodgePermissions::ADD_PAYMENT));
        assert!(user.permissions.has(LodgePermissions::ADD_EVENT));

        let mut tx = pool.begin().await.unwrap();
        assert!(delete_officer_role(&mut tx, user.id).await.unwrap());
        cascade::on_officer_role_removed(&mut tx, user.id).await.unwrap();
        tx.commit().await.unwrap();

        assert!(find_user_groups(&pool, user.id).await.unwrap().is_empty());
        assert!(find_officer_role(&pool, user.id).await.unwrap().is_none());
    }

    // ========================================================================
    // Session and Reset Token Tests
    // ========================================================================

    #[sqlx::test]
    #[ignore]
    async fn test_session_lifecycle(pool: PgPool) {
        let user = new_user(&pool, "sesion").await;
        let expires = Utc::now() + Duration::hours(1);

        create_session(&pool, user.id, "hash-a", expires, Some("10.0.0.1"), None)
            .await
            .unwrap();
        assert!(find_session_by_token_hash(&pool, "hash-a").await.unwrap().is_some());

        assert!(delete_session_by_token_hash(&pool, "hash-a").await.unwrap());
        assert!(find_session_by_token_hash(&pool, "hash-a").await.unwrap().is_none());

        create_session(&pool, user.id, "expired", Utc::now() - Duration::hours(1), None, None)
            .await
            .unwrap();
        assert!(find_session_by_token_hash(&pool, "expired").await.unwrap().is_none());
    }

    #[sqlx::test]
    #[ignore]
    async fn test_reset_token_is_single_use(pool: PgPool) {
        let user = new_user(&pool, "olvido").await;
        let token = create_password_reset_token(
            &pool,
            user.id,
            "reset-hash",
            Utc::now() + Duration::hours(1),
        )
        .await
        .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        assert!(mark_reset_token_used(&mut conn, token.id).await.unwrap());
        assert!(!mark_reset_token_used(&mut conn, token.id).await.unwrap());
        assert!(find_valid_reset_token(&pool, "reset-hash").await.unwrap().is_none());
    }
}
