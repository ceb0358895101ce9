#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildStage {
    #[default]
    Preprocessing,
    Building,
    Writing,
    Finished,
}

/// Progress message sent by the builder while it works through the dates of a subject
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildStatus {
    pub progress: f32,
    pub date: String,
    pub stage: BuildStage,
}

impl BuildStatus {
    pub fn new(progress: f32, date: &str, stage: BuildStage) -> Self {
        Self {
            progress,
            date: date.to_string(),
            stage,
        }
    }
}
