//! Registry of the attribution engine's built-in step functions.
//!
//! Step functions are scores computed at every generation step (probability,
//! entropy, contrastive differences, ...). A step function is contrastive when
//! it compares the model's behavior on a regular input with its behavior on a
//! contrastive (e.g. contextless) input, which is what context sensitivity
//! detection needs.

use serde::Serialize;

/// Descriptor for one built-in step function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepFunction {
    pub name: &'static str,
    /// Whether the function requires contrastive targets.
    pub contrastive: bool,
    pub description: &'static str,
}

const STEP_FUNCTIONS: &[StepFunction] = &[
    StepFunction {
        name: "logit",
        contrastive: false,
        description: "Logit of the target token",
    },
    StepFunction {
        name: "probability",
        contrastive: false,
        description: "Probability of the target token",
    },
    StepFunction {
        name: "entropy",
        contrastive: false,
        description: "Entropy of the output distribution",
    },
    StepFunction {
        name: "crossentropy",
        contrastive: false,
        description: "Cross-entropy loss of the target token",
    },
    StepFunction {
        name: "perplexity",
        contrastive: false,
        description: "Perplexity of the target token",
    },
    StepFunction {
        name: "mc_dropout_prob_avg",
        contrastive: false,
        description: "Average target probability over Monte Carlo dropout samples",
    },
    StepFunction {
        name: "top_p_size",
        contrastive: false,
        description: "Number of tokens covering the top-p probability mass",
    },
    StepFunction {
        name: "contrast_logits",
        contrastive: true,
        description: "Logit of the target token given the contrastive input",
    },
    StepFunction {
        name: "contrast_prob",
        contrastive: true,
        description: "Probability of the target token given the contrastive input",
    },
    StepFunction {
        name: "contrast_logits_diff",
        contrastive: true,
        description: "Difference between regular and contrastive target logits",
    },
    StepFunction {
        name: "contrast_prob_diff",
        contrastive: true,
        description: "Difference between regular and contrastive target probabilities",
    },
    StepFunction {
        name: "pcxmi",
        contrastive: true,
        description: "Pointwise contextual cross-mutual information",
    },
    StepFunction {
        name: "kl_divergence",
        contrastive: true,
        description: "KL divergence between regular and contrastive output distributions",
    },
    StepFunction {
        name: "in_context_pvi",
        contrastive: true,
        description: "In-context pointwise V-usable information",
    },
];

/// All registered step functions, non-contrastive first.
pub fn list_step_functions() -> &'static [StepFunction] {
    STEP_FUNCTIONS
}

/// Names of the step functions usable as context sensitivity metrics.
pub fn contrastive_step_functions() -> Vec<&'static str> {
    STEP_FUNCTIONS
        .iter()
        .filter(|f| f.contrastive)
        .map(|f| f.name)
        .collect()
}

/// Look up a step function by name.
pub fn find(name: &str) -> Option<&'static StepFunction> {
    STEP_FUNCTIONS.iter().find(|f| f.name == name)
}

/// `false` for unknown names as well as registered non-contrastive functions.
pub fn is_contrastive_step_function(name: &str) -> bool {
    find(name).is_some_and(|f| f.contrastive)
}
