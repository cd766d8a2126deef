//! Loops uplink audio back out on downlink.
//!
//! Grounded on `original_source/src/media/stages/EchoStage.cpp`.

use crate::stage::Stage;

#[derive(Default)]
pub struct EchoStage {
    slot: Option<Vec<u8>>,
}

impl EchoStage {
    pub fn new() -> Self {
        EchoStage { slot: None }
    }
}

impl Stage for EchoStage {
    fn process_uplink(&mut self, frame: &mut Vec<u8>) {
        if !frame.is_empty() {
            self.slot = Some(frame.clone());
        }
    }

    fn process_downlink(&mut self, frame: &mut Vec<u8>) {
        if let Some(buffered) = self.slot.take() {
            if frame.is_empty() {
                *frame = buffered;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_empty_downlink_with_last_uplink() {
        let mut stage = EchoStage::new();
        let mut uplink = vec![9, 9, 9];
        stage.process_uplink(&mut uplink);

        let mut downlink = Vec::new();
        stage.process_downlink(&mut downlink);
        assert_eq!(downlink, vec![9, 9, 9]);
    }

    #[test]
    fn does_not_overwrite_nonempty_downlink() {
        let mut stage = EchoStage::new();
        stage.process_uplink(&mut vec![1, 2, 3]);

        let mut downlink = vec![7];
        stage.process_downlink(&mut downlink);
        assert_eq!(downlink, vec![7]);
    }

    #[test]
    fn slot_is_cleared_after_one_downlink_tick() {
        let mut stage = EchoStage::new();
        stage.process_uplink(&mut vec![1, 2, 3]);

        let mut first = Vec::new();
        stage.process_downlink(&mut first);
        assert_eq!(first, vec![1, 2, 3]);

        let mut second = Vec::new();
        stage.process_downlink(&mut second);
        assert!(second.is_empty());
    }
}
