pub mod behavior_tree;
pub mod intent;
pub mod templates;

pub use behavior_tree::{BehaviorTree, ObservationContext};
pub use intent::IntentClassifier;
pub use templates::{ResponseVariant, TemplateLibrary};
