/// Index of a joint in a fabric instance's joint table.
///
/// Joints are never removed, so a joint index stays valid for the
/// lifetime of the instance (until it is reset).
pub type JointIndex = u16;

/// Index of an interval in a fabric instance's interval table.
///
/// Interval removal shifts every later entry down by one, so an index
/// captured before a removal may name a different interval afterwards.
pub type IntervalIndex = u16;

/// Index of a face in a fabric instance's face table.
///
/// Like [`IntervalIndex`], this is unstable under removal. Hold a
/// [`crate::growth::FaceSnapshot`] to re-locate a face later.
pub type FaceIndex = u16;

/// Slot of an instance inside an [`crate::arena::Arena`].
pub type InstanceIndex = u16;

/// Creation tag of a joint. Assigned once, never reused within an instance.
///
/// Mirrored (left/right) joints share one tag.
pub type JointTag = u16;

/// Structural state number, `0..STATE_COUNT`.
pub type StateIndex = u8;

/// Number of structural states an interval keeps a target length for.
pub const STATE_COUNT: usize = 8;

/// Raw "no such element" value at the buffer boundary.
pub const ERROR_SENTINEL: u16 = u16::MAX;
