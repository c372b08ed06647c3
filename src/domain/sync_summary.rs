use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityOutcome {
    Processed,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelCounts {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl LevelCounts {
    pub fn record(&mut self, outcome: EntityOutcome) {
        match outcome {
            EntityOutcome::Processed => self.processed += 1,
            EntityOutcome::Skipped => self.skipped += 1,
            EntityOutcome::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.processed + self.skipped + self.failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// The station list could not be fetched; nothing below it ran.
    Aborted(String),
    /// Another run of the same job was still in progress.
    SkippedOverlap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub run_id: Uuid,
    pub started_at: String,
    pub finished_at: String,
    pub status: RunStatus,
    pub stations: LevelCounts,
    pub devices: LevelCounts,
    pub telemetry: LevelCounts,
    pub device_list_failures: usize,
}

impl SyncSummary {
    pub fn new(run_id: Uuid, started_at: String) -> Self {
        Self {
            run_id,
            finished_at: started_at.clone(),
            started_at,
            status: RunStatus::Completed,
            stations: LevelCounts::default(),
            devices: LevelCounts::default(),
            telemetry: LevelCounts::default(),
            device_list_failures: 0,
        }
    }

    pub fn has_failures(&self) -> bool {
        matches!(self.status, RunStatus::Aborted(_))
            || self.device_list_failures > 0
            || self.stations.failed > 0
            || self.devices.failed > 0
            || self.telemetry.failed > 0
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{EntityOutcome, LevelCounts, RunStatus, SyncSummary};

    #[test]
    fn records_outcomes_per_level() {
        let mut counts = LevelCounts::default();

        counts.record(EntityOutcome::Processed);
        counts.record(EntityOutcome::Processed);
        counts.record(EntityOutcome::Skipped);
        counts.record(EntityOutcome::Failed);

        assert_eq!(
            counts,
            LevelCounts {
                processed: 2,
                skipped: 1,
                failed: 1,
            }
        );
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn skipped_entities_are_not_failures() {
        let mut summary = SyncSummary::new(Uuid::nil(), "2026-10-19T00:00:00.000Z".to_string());
        summary.telemetry.record(EntityOutcome::Skipped);

        assert!(!summary.has_failures());

        summary.status = RunStatus::Aborted("station list failed".to_string());
        assert!(summary.has_failures());
    }
}
