//! Fixed class table mapping classifier output indices to pH labels/values.
//!
//! The order is a training-time contract: the dataset loader sorted class
//! directories lexicographically, so the classifier's output layer was
//! trained against `pH_10, pH_4, ..., pH_9` in that order. Changing this
//! table without retraining silently corrupts every prediction, which is
//! why the checkpoint metadata carries its own copy that gets validated
//! at load time (see `model.rs`).

pub const NUM_CLASSES: usize = 7;

const PH_CLASSES: [&str; NUM_CLASSES] = ["pH_10", "pH_4", "pH_5", "pH_6", "pH_7", "pH_8", "pH_9"];
const PH_VALUES: [f32; NUM_CLASSES] = [10.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];

/// Label for a classifier output index. Panics if `index >= NUM_CLASSES`;
/// an out-of-range index means the model's output width has drifted from
/// this table, which is a deployment defect rather than a runtime condition.
pub fn label_of(index: usize) -> &'static str {
    PH_CLASSES[index]
}

/// Numeric pH value for a classifier output index. Same panic contract as
/// `label_of`.
pub fn value_of(index: usize) -> f32 {
    PH_VALUES[index]
}

pub fn len() -> usize {
    NUM_CLASSES
}

pub fn entries() -> impl Iterator<Item = (&'static str, f32)> {
    PH_CLASSES.iter().copied().zip(PH_VALUES.iter().copied())
}
