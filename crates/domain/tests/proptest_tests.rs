//! Property-based tests for domain types
//!
//! These tests use proptest to verify invariants across many random inputs.

use domain::{
    Embedding, EmbeddingInput, ModelCategory, ModelMetadata, NormalizedResponse, ToolCall,
};
use proptest::prelude::*;

fn metadata_with_ceiling(ceiling: u32) -> ModelMetadata {
    ModelMetadata {
        id: "prop-model".to_string(),
        category: ModelCategory::Chat,
        supported_params: Default::default(),
        max_context_tokens: 0,
        max_output_tokens: ceiling,
        reasoning_required: false,
        endpoints: Default::default(),
        description: String::new(),
        post_parameters: None,
    }
}

// ============================================================================
// Output token clamping
// ============================================================================

mod clamp_tests {
    use super::*;

    proptest! {
        #[test]
        fn clamped_tokens_stay_within_bounds(ceiling in 0u32..200_000, requested in any::<u32>()) {
            let meta = metadata_with_ceiling(ceiling);
            let clamped = meta.clamp_output_tokens(requested);
            prop_assert!(clamped >= 1);
            prop_assert!(clamped <= ceiling.max(1));
        }

        #[test]
        fn in_range_requests_are_untouched(ceiling in 1u32..200_000, frac in 0.0f64..1.0) {
            let meta = metadata_with_ceiling(ceiling);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let requested = ((f64::from(ceiling) * frac) as u32).max(1);
            prop_assert_eq!(meta.clamp_output_tokens(requested), requested);
        }
    }
}

// ============================================================================
// Embedding cardinality
// ============================================================================

mod embedding_tests {
    use super::*;

    proptest! {
        #[test]
        fn batch_output_matches_input_order(texts in prop::collection::vec("[a-z]{1,8}", 0..20)) {
            #[allow(clippy::cast_precision_loss)]
            let vectors: Vec<Vec<f32>> = (0..texts.len()).map(|i| vec![i as f32]).collect();
            let input = EmbeddingInput::Batch(texts.clone());
            let out = Embedding::for_input(&input, vectors).unwrap();
            let Embedding::Batch(out) = out else {
                return Err(TestCaseError::fail("batch input produced a single vector"));
            };
            prop_assert_eq!(out.len(), texts.len());
            #[allow(clippy::cast_precision_loss)]
            for (i, v) in out.iter().enumerate() {
                prop_assert_eq!(v[0], i as f32);
            }
        }

        #[test]
        fn single_input_never_becomes_batch(text in ".{0,32}") {
            let input = EmbeddingInput::Single(text);
            let out = Embedding::for_input(&input, vec![vec![1.0, 2.0]]).unwrap();
            prop_assert!(matches!(out, Embedding::Single(_)));
        }
    }
}

// ============================================================================
// Response normalization
// ============================================================================

mod response_tests {
    use super::*;

    proptest! {
        #[test]
        fn tool_calls_are_never_lost(text in ".{0,16}", count in 0usize..5) {
            let calls: Vec<ToolCall> = (0..count)
                .map(|i| ToolCall::new(format!("c{i}"), format!("f{i}"), serde_json::json!({})))
                .collect();
            let resp = NormalizedResponse::from_parts(text, calls);
            prop_assert_eq!(resp.tool_calls().len(), count);
            prop_assert_eq!(resp.has_tool_calls(), count > 0);
        }
    }
}
