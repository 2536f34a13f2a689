pub mod bundle;
pub mod captioner;
pub mod component;
pub mod parameter;
pub mod tensor;

pub use bundle::{Bundle, LOAD_TIME, LOSS};
pub use captioner::{Captioner, LoadReport};
pub use component::{load_component, Component};
pub use parameter::{CheckpointFile, Parameter, StateDict};
pub use tensor::Tensor;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::metrics::phase::Mode;

    struct TwoPart {
        params: Vec<Parameter>,
    }

    impl TwoPart {
        fn new() -> Self {
            TwoPart {
                params: vec![
                    Parameter::new("pn_extractor.w", vec![0.0; 2]),
                    Parameter::new("decoder.word_logits", vec![0.0; 3]),
                ],
            }
        }
    }

    impl Captioner for TwoPart {
        fn set_mode(&mut self, _mode: Mode) {}
        fn forward(&mut self, batch: Bundle) -> Result<Bundle> {
            Ok(batch)
        }
        fn backward(&mut self, _output: &Bundle) -> Result<()> {
            Ok(())
        }
        fn parameters(&self) -> Vec<&Parameter> {
            self.params.iter().collect()
        }
        fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
            self.params.iter_mut().collect()
        }
    }

    #[test]
    fn non_strict_load_skips_unknown_names() {
        let mut model = TwoPart::new();
        let mut state = StateDict::new();
        state.insert("decoder.word_logits", vec![1.0, 2.0, 3.0]);
        state.insert("votenet_extractor.w", vec![9.0]);

        let report = model.load_state_dict(&state, false).unwrap();
        assert_eq!(report.loaded, vec!["decoder.word_logits".to_owned()]);
        assert_eq!(report.missing, vec!["pn_extractor.w".to_owned()]);
        assert_eq!(report.unexpected, vec!["votenet_extractor.w".to_owned()]);
        assert_eq!(model.params[1].value, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn strict_load_rejects_mismatch_without_loading() {
        let mut model = TwoPart::new();
        let mut state = StateDict::new();
        state.insert("decoder.word_logits", vec![1.0, 2.0, 3.0]);

        assert!(model.load_state_dict(&state, true).is_err());
        assert_eq!(model.params[1].value, vec![0.0; 3]);
    }

    #[test]
    fn component_load_accepts_relative_names_and_freezes() {
        let mut model = TwoPart::new();
        let mut state = StateDict::new();
        state.insert("w", vec![4.0, 5.0]);

        let loaded = load_component(&mut model, Component::PointNetExtractor, &state).unwrap();
        assert_eq!(loaded, 1);
        assert_eq!(model.params[0].value, vec![4.0, 5.0]);
        assert!(!model.params[0].requires_grad);
        assert!(model.params[1].requires_grad);
        assert_eq!(model.num_trainable_params(), 3);
    }

    #[test]
    fn component_load_without_matches_fails() {
        let mut model = TwoPart::new();
        let state = StateDict::new();
        assert!(load_component(&mut model, Component::VoteNet, &state).is_err());
    }

    #[test]
    fn shape_mismatch_is_fatal() {
        let mut model = TwoPart::new();
        let mut state = StateDict::new();
        state.insert("decoder.word_logits", vec![1.0]);
        assert!(model.load_state_dict(&state, false).is_err());
    }
}
