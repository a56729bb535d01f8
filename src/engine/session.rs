/// One bounded run of status checks for a single target. Lives only inside
/// the spawned poll task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingSession {
    pub target_id: String,
    pub attempts_made: u32,
}

impl PollingSession {
    pub fn new(target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            attempts_made: 0,
        }
    }
}
