//! Ordered stage list driving one call's audio in both directions.
//!
//! Grounded on `original_source/src/media/MediaPipeline.cpp`.

use crate::stage::Stage;

#[derive(Default)]
pub struct MediaPipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl MediaPipeline {
    pub fn new() -> Self {
        MediaPipeline { stages: Vec::new() }
    }

    pub fn add_stage(&mut self, stage: Box<dyn Stage>) {
        self.stages.push(stage);
    }

    /// Threads `input` through every stage in order.
    pub fn process_uplink(&mut self, input: &[u8]) {
        let mut current = input.to_vec();
        for stage in &mut self.stages {
            stage.process_uplink(&mut current);
        }
    }

    /// Starts from an empty frame and passes it through every stage in
    /// order; returns whatever the last stage left in it.
    pub fn process_downlink(&mut self) -> Vec<u8> {
        let mut current = Vec::new();
        for stage in &mut self.stages {
            stage.process_downlink(&mut current);
        }
        current
    }
}
