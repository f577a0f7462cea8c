//! Host metrics sampling and health classification.

use sysinfo::{Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};

use super::types::{HealthStatus, Uptime};

const WARNING_THRESHOLD: f64 = 70.0;
const CRITICAL_THRESHOLD: f64 = 90.0;

/// CPU, memory and disk usage in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostSample {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub disk_usage: f64,
}

/// Sample host usage. Blocks for one CPU refresh interval.
pub fn sample_host() -> HostSample {
    let mut system = System::new();
    system.refresh_cpu_usage();
    std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    system.refresh_cpu_usage();
    system.refresh_memory();

    let memory_usage = percent(system.used_memory(), system.total_memory());

    let disks = Disks::new_with_refreshed_list();
    let (total, available) = disks
        .list()
        .iter()
        .fold((0u64, 0u64), |(total, available), disk| {
            (total + disk.total_space(), available + disk.available_space())
        });

    HostSample {
        cpu_usage: round1(f64::from(system.global_cpu_usage())),
        memory_usage,
        disk_usage: percent(total.saturating_sub(available), total),
    }
}

/// Seconds since the host booted.
pub fn host_uptime_secs() -> u64 {
    System::uptime()
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        round1(used as f64 / total as f64 * 100.0)
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Critical above 90 on any metric, warning above 70, else healthy.
pub fn classify(sample: &HostSample) -> (HealthStatus, String) {
    let metrics = [
        ("CPU", sample.cpu_usage),
        ("memoria", sample.memory_usage),
        ("disco", sample.disk_usage),
    ];

    let over = |threshold: f64| -> Vec<String> {
        metrics
            .iter()
            .filter(|(_, value)| *value > threshold)
            .map(|(name, value)| format!("{name} {value:.1}%"))
            .collect()
    };

    let critical = over(CRITICAL_THRESHOLD);
    if !critical.is_empty() {
        return (
            HealthStatus::Critical,
            format!("Uso crítico: {}", critical.join(", ")),
        );
    }

    let warning = over(WARNING_THRESHOLD);
    if !warning.is_empty() {
        return (
            HealthStatus::Warning,
            format!("Uso elevado: {}", warning.join(", ")),
        );
    }

    (HealthStatus::Healthy, "Sistema funcionando normalmente".to_string())
}

pub const fn uptime_parts(secs: u64) -> Uptime {
    Uptime {
        days: secs / 86_400,
        hours: (secs % 86_400) / 3_600,
        minutes: (secs % 3_600) / 60,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cpu: f64, memory: f64, disk: f64) -> HostSample {
        HostSample {
            cpu_usage: cpu,
            memory_usage: memory,
            disk_usage: disk,
        }
    }

    #[test]
    fn test_classify_thresholds() {
        assert_eq!(classify(&sample(10.0, 20.0, 30.0)).0, HealthStatus::Healthy);
        assert_eq!(classify(&sample(70.0, 20.0, 30.0)).0, HealthStatus::Healthy);
        assert_eq!(classify(&sample(70.1, 20.0, 30.0)).0, HealthStatus::Warning);
        assert_eq!(classify(&sample(10.0, 90.0, 71.0)).0, HealthStatus::Warning);
        assert_eq!(classify(&sample(10.0, 20.0, 90.5)).0, HealthStatus::Critical);
    }

    #[test]
    fn test_critical_message_names_metric() {
        let (_, message) = classify(&sample(95.0, 20.0, 30.0));
        assert!(message.contains("CPU 95.0%"));
    }

    #[test]
    fn test_percent_handles_zero_total() {
        assert!((percent(5, 0) - 0.0).abs() < f64::EPSILON);
        assert!((percent(1, 3) - 33.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_uptime_parts() {
        assert_eq!(
            uptime_parts(2 * 86_400 + 5 * 3_600 + 42 * 60 + 17),
            Uptime {
                days: 2,
                hours: 5,
                minutes: 42
            }
        );
        assert_eq!(uptime_parts(59), Uptime { days: 0, hours: 0, minutes: 0 });
    }
}
