use std::time::Duration;

const BYTES_PER_MB: f64 = 1_048_576.0;

/// MB/s as `(bytes / 2^20) / seconds`, zero bytes or zero time report 0 instead of NaN/inf
pub fn megabytes_per_second(bytes: u64, elapsed: Duration) -> f64 {
    let seconds = elapsed.as_secs_f64();

    if bytes == 0 || seconds == 0.0 {
        0.0
    } else {
        (bytes as f64 / BYTES_PER_MB) / seconds
    }
}

/// operations per second with the same zero guard
pub fn operations_per_second(operations: u64, elapsed: Duration) -> f64 {
    let seconds = elapsed.as_secs_f64();

    if operations == 0 || seconds == 0.0 {
        0.0
    } else {
        operations as f64 / seconds
    }
}

/// Accumulates bytes and wall-clock time of one phase over all iterations
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseMeter {
    pub bytes: u64,
    pub elapsed: Duration,
}

impl PhaseMeter {
    pub fn add(&mut self, bytes: u64, elapsed: Duration) {
        self.bytes += bytes;
        self.elapsed += elapsed;
    }

    pub fn throughput(&self) -> f64 {
        megabytes_per_second(self.bytes, self.elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_mebibytes_in_two_seconds() {
        assert_eq!(
            megabytes_per_second(10_485_760, Duration::from_millis(2000)),
            5.0
        );
    }

    #[test]
    fn zero_duration_is_zero() {
        let throughput = megabytes_per_second(10_485_760, Duration::ZERO);

        assert_eq!(throughput, 0.0);
        assert!(throughput.is_finite());
    }

    #[test]
    fn zero_bytes_is_zero() {
        assert_eq!(megabytes_per_second(0, Duration::from_secs(3)), 0.0);
        assert_eq!(operations_per_second(0, Duration::ZERO), 0.0);
    }

    #[test]
    fn meter_accumulates_phases() {
        let mut meter = PhaseMeter::default();
        meter.add(5_242_880, Duration::from_millis(500));
        meter.add(5_242_880, Duration::from_millis(1500));

        assert_eq!(meter.bytes, 10_485_760);
        assert_eq!(meter.throughput(), 5.0);
        assert_eq!(operations_per_second(300, Duration::from_millis(1500)), 200.0);
    }
}
