//! 网的静态结构元素：四类弧与迁移。
//!
//! 迁移一经构造即不可变，内部以 `Arc` 共享，克隆代价为一次引用计数。
use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use thiserror::Error;

use crate::net::ids::PlaceKey;
use crate::net::marking::Marking;

pub type Weight = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArcKind {
    Input,
    Output,
    Inhibitor,
    Reset,
}

impl fmt::Display for ArcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArcKind::Input => "input",
            ArcKind::Output => "output",
            ArcKind::Inhibitor => "inhibitor",
            ArcKind::Reset => "reset",
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidTransition {
    #[error("{kind} arc on place {place} has weight 0")]
    ZeroWeight { kind: ArcKind, place: String },
    #[error("duplicate {kind} arc on place {place}")]
    DuplicateArc { kind: ArcKind, place: String },
}

/// 输入弧: place -> transition, 发射时扣除 `weight` 个 token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputArc<P> {
    pub place: P,
    pub weight: Weight,
}

impl<P: PlaceKey> InputArc<P> {
    pub fn permits(&self, marking: &Marking<P>) -> bool {
        marking.tokens(&self.place) >= self.weight
    }

    fn consume(&self, marking: &mut Marking<P>) {
        let tokens = marking.tokens_mut(&self.place);
        match tokens.checked_sub(self.weight) {
            Some(left) => *tokens = left,
            None => crate::unrecoverable!(
                "input arc on {:?} drains {} tokens from {}",
                self.place,
                self.weight,
                *tokens
            ),
        }
    }
}

/// 输出弧: transition -> place, 发射时增加 `weight` 个 token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputArc<P> {
    pub place: P,
    pub weight: Weight,
}

impl<P: PlaceKey> OutputArc<P> {
    /// Tokens left in the place after `consumed` are taken and this arc
    /// produces, or `None` when the count does not fit in a [`Weight`].
    fn produced(&self, marking: &Marking<P>, consumed: Weight) -> Option<Weight> {
        marking
            .tokens(&self.place)
            .checked_sub(consumed)?
            .checked_add(self.weight)
    }

    fn produce(&self, marking: &mut Marking<P>) {
        let tokens = marking.tokens_mut(&self.place);
        match tokens.checked_add(self.weight) {
            Some(total) => *tokens = total,
            None => crate::unrecoverable!(
                "output arc on {:?} overflows {} tokens by {}",
                self.place,
                *tokens,
                self.weight
            ),
        }
    }
}

/// 抑制弧: 库所为空时才允许发射.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InhibitorArc<P> {
    pub place: P,
}

impl<P: PlaceKey> InhibitorArc<P> {
    pub fn permits(&self, marking: &Marking<P>) -> bool {
        marking.tokens(&self.place) == 0
    }
}

/// 复位弧: 发射后库所清零.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResetArc<P> {
    pub place: P,
}

impl<P: PlaceKey> ResetArc<P> {
    fn clear(&self, marking: &mut Marking<P>) {
        *marking.tokens_mut(&self.place) = 0;
    }
}

#[derive(PartialEq, Eq, Hash)]
struct TransitionInner<P> {
    name: Option<String>,
    inputs: Vec<InputArc<P>>,
    outputs: Vec<OutputArc<P>>,
    inhibitors: Vec<InhibitorArc<P>>,
    resets: Vec<ResetArc<P>>,
}

/// An immutable bundle of arcs fired atomically.
///
/// Cloning shares the arcs. Equality is structural, so two transitions built
/// from the same arcs and name compare equal.
pub struct Transition<P: PlaceKey> {
    inner: Arc<TransitionInner<P>>,
}

impl<P: PlaceKey> Transition<P> {
    /// Builds an unnamed transition from its four arc sets.
    ///
    /// Weights must be at least 1 and a place may appear at most once per
    /// arc kind.
    pub fn new<I, R, H, O>(
        inputs: I,
        resets: R,
        inhibitors: H,
        outputs: O,
    ) -> Result<Self, InvalidTransition>
    where
        I: IntoIterator<Item = (P, Weight)>,
        R: IntoIterator<Item = P>,
        H: IntoIterator<Item = P>,
        O: IntoIterator<Item = (P, Weight)>,
    {
        let mut builder = TransitionBuilder::unnamed();
        for (place, weight) in inputs {
            builder = builder.input(place, weight);
        }
        for place in resets {
            builder = builder.reset(place);
        }
        for place in inhibitors {
            builder = builder.inhibitor(place);
        }
        for (place, weight) in outputs {
            builder = builder.output(place, weight);
        }
        builder.build()
    }

    pub fn builder(name: impl Into<String>) -> TransitionBuilder<P> {
        TransitionBuilder {
            name: Some(name.into()),
            ..TransitionBuilder::unnamed()
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn input_arcs(&self) -> &[InputArc<P>] {
        &self.inner.inputs
    }

    pub fn output_arcs(&self) -> &[OutputArc<P>] {
        &self.inner.outputs
    }

    pub fn inhibitor_arcs(&self) -> &[InhibitorArc<P>] {
        &self.inner.inhibitors
    }

    pub fn reset_arcs(&self) -> &[ResetArc<P>] {
        &self.inner.resets
    }

    /// Every place referenced by any arc, possibly with repeats across kinds.
    pub fn places(&self) -> impl Iterator<Item = &P> {
        let inner = &*self.inner;
        inner
            .inputs
            .iter()
            .map(|arc| &arc.place)
            .chain(inner.inhibitors.iter().map(|arc| &arc.place))
            .chain(inner.resets.iter().map(|arc| &arc.place))
            .chain(inner.outputs.iter().map(|arc| &arc.place))
    }

    /// Input and inhibitor conditions hold, and no output place would
    /// exceed [`Weight::MAX`].
    pub fn is_enabled(&self, marking: &Marking<P>) -> bool {
        self.inner.inputs.iter().all(|arc| arc.permits(marking))
            && self.inner.inhibitors.iter().all(|arc| arc.permits(marking))
            && self.outputs_fit(marking)
    }

    fn consumed_from(&self, place: &P) -> Weight {
        self.inner
            .inputs
            .iter()
            .find(|arc| &arc.place == place)
            .map_or(0, |arc| arc.weight)
    }

    fn is_reset(&self, place: &P) -> bool {
        self.inner.resets.iter().any(|arc| &arc.place == place)
    }

    // reset places end at zero whatever was produced into them
    fn outputs_fit(&self, marking: &Marking<P>) -> bool {
        self.inner
            .outputs
            .iter()
            .filter(|arc| !self.is_reset(&arc.place))
            .all(|arc| arc.produced(marking, self.consumed_from(&arc.place)).is_some())
    }

    /// Applies the effect in place: widen, consume, produce, then reset.
    ///
    /// The caller must have checked [`Transition::is_enabled`]. Applying a
    /// transition that is not enabled is an unrecoverable error, raised
    /// before the marking is touched when an output would overflow.
    pub fn apply(&self, marking: &mut Marking<P>) {
        if !self.outputs_fit(marking) {
            crate::unrecoverable!("{:?} overflows an output place of {:?}", self, marking);
        }
        marking.widen(self.places());
        for arc in &self.inner.inputs {
            arc.consume(marking);
        }
        for arc in self.inner.outputs.iter().filter(|arc| !self.is_reset(&arc.place)) {
            arc.produce(marking);
        }
        for arc in &self.inner.resets {
            arc.clear(marking);
        }
    }

    /// The marking reached by firing on a copy of `marking`, if enabled.
    pub fn successor(&self, marking: &Marking<P>) -> Option<Marking<P>> {
        if !self.is_enabled(marking) {
            return None;
        }
        let mut next = marking.clone();
        self.apply(&mut next);
        Some(next)
    }
}

impl<P: PlaceKey> Clone for Transition<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: PlaceKey> PartialEq for Transition<P> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner == other.inner
    }
}

impl<P: PlaceKey> Eq for Transition<P> {}

impl<P: PlaceKey> std::hash::Hash for Transition<P> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl<P: PlaceKey> fmt::Debug for Transition<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.name {
            Some(name) => f.debug_tuple("Transition").field(name).finish(),
            None => f
                .debug_struct("Transition")
                .field("inputs", &self.inner.inputs)
                .field("outputs", &self.inner.outputs)
                .field("inhibitors", &self.inner.inhibitors)
                .field("resets", &self.inner.resets)
                .finish(),
        }
    }
}

/// Collects arcs and validates them once in [`TransitionBuilder::build`].
#[derive(Debug, Clone)]
pub struct TransitionBuilder<P: PlaceKey> {
    name: Option<String>,
    inputs: Vec<InputArc<P>>,
    outputs: Vec<OutputArc<P>>,
    inhibitors: Vec<InhibitorArc<P>>,
    resets: Vec<ResetArc<P>>,
}

impl<P: PlaceKey> TransitionBuilder<P> {
    fn unnamed() -> Self {
        Self {
            name: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            inhibitors: Vec::new(),
            resets: Vec::new(),
        }
    }

    pub fn input(mut self, place: P, weight: Weight) -> Self {
        self.inputs.push(InputArc { place, weight });
        self
    }

    pub fn output(mut self, place: P, weight: Weight) -> Self {
        self.outputs.push(OutputArc { place, weight });
        self
    }

    pub fn inhibitor(mut self, place: P) -> Self {
        self.inhibitors.push(InhibitorArc { place });
        self
    }

    pub fn reset(mut self, place: P) -> Self {
        self.resets.push(ResetArc { place });
        self
    }

    pub fn build(self) -> Result<Transition<P>, InvalidTransition> {
        let weighted = self
            .inputs
            .iter()
            .map(|arc| (ArcKind::Input, &arc.place, arc.weight))
            .chain(
                self.outputs
                    .iter()
                    .map(|arc| (ArcKind::Output, &arc.place, arc.weight)),
            );
        let unweighted = self
            .inhibitors
            .iter()
            .map(|arc| (ArcKind::Inhibitor, &arc.place, 1))
            .chain(
                self.resets
                    .iter()
                    .map(|arc| (ArcKind::Reset, &arc.place, 1)),
            );

        let mut seen = IndexSet::new();
        for (kind, place, weight) in weighted.chain(unweighted) {
            if weight == 0 {
                return Err(InvalidTransition::ZeroWeight {
                    kind,
                    place: format!("{:?}", place),
                });
            }
            if !seen.insert((kind, place)) {
                return Err(InvalidTransition::DuplicateArc {
                    kind,
                    place: format!("{:?}", place),
                });
            }
        }

        Ok(Transition {
            inner: Arc::new(TransitionInner {
                name: self.name,
                inputs: self.inputs,
                outputs: self.outputs,
                inhibitors: self.inhibitors,
                resets: self.resets,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};

    fn no_places() -> Vec<&'static str> {
        Vec::new()
    }

    #[test]
    fn firing_moves_exact_weights() {
        let t = Transition::new([("a", 2)], no_places(), no_places(), [("b", 3)]).unwrap();
        let mut marking = Marking::from([("a", 5), ("b", 1)]);
        assert!(t.is_enabled(&marking));
        t.apply(&mut marking);
        assert_eq!(marking.tokens(&"a"), 3);
        assert_eq!(marking.tokens(&"b"), 4);
    }

    #[test]
    fn overflowing_output_is_not_enabled() {
        let t = Transition::builder("fill").input("a", 1).output("p", 1).build().unwrap();
        let full = Marking::from([("a", 1), ("p", u64::MAX)]);
        assert!(!t.is_enabled(&full));
        assert!(t.successor(&full).is_none());

        // consuming from the same place first keeps the count in range
        let cycle = Transition::builder("cycle").input("p", 1).output("p", 1).build().unwrap();
        assert!(cycle.is_enabled(&Marking::from([("p", u64::MAX)])));

        let flushed = Transition::builder("flush").output("p", 1).reset("p").build().unwrap();
        assert_eq!(
            flushed.successor(&Marking::from([("p", u64::MAX)])),
            Some(Marking::new())
        );
    }

    #[test]
    fn applying_an_overflowing_output_leaves_marking_untouched() {
        let t = Transition::builder("fill").input("a", 1).output("p", 1).build().unwrap();
        let original = Marking::from([("a", 1), ("p", u64::MAX)]);
        let mut marking = original.clone();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| t.apply(&mut marking)));
        assert!(outcome.is_err());
        assert_eq!(marking, original);
    }

    #[test]
    fn input_needs_enough_tokens() {
        let t = Transition::new([("a", 2)], no_places(), no_places(), []).unwrap();
        assert!(!t.is_enabled(&Marking::from([("a", 1)])));
        assert!(!t.is_enabled(&Marking::new()));
        assert!(t.successor(&Marking::from([("a", 1)])).is_none());
    }

    #[test]
    fn inhibitor_requires_empty_place() {
        let t = Transition::new([], no_places(), ["x"], [("y", 1)]).unwrap();
        assert!(t.is_enabled(&Marking::new()));
        assert!(t.is_enabled(&Marking::from([("x", 0)])));
        assert!(!t.is_enabled(&Marking::from([("x", 1)])));
    }

    #[test]
    fn reset_wins_over_output() {
        let t = Transition::new([], ["p"], no_places(), [("p", 4)]).unwrap();
        let next = t.successor(&Marking::from([("p", 7)])).unwrap();
        assert_eq!(next.tokens(&"p"), 0);
    }

    #[test]
    fn apply_widens_referenced_places() {
        let t = Transition::new([], ["r"], ["h"], [("o", 1)]).unwrap();
        let mut marking = Marking::new();
        t.apply(&mut marking);
        assert!(marking.contains_place(&"r"));
        assert!(marking.contains_place(&"h"));
        assert_eq!(marking.tokens(&"o"), 1);
    }

    #[test]
    fn enablement_is_monotone_in_inputs() {
        let t = Transition::builder("t")
            .input("a", 2)
            .input("b", 1)
            .inhibitor("z")
            .build()
            .unwrap();
        let base = Marking::from([("a", 2), ("b", 1)]);
        assert!(t.is_enabled(&base));
        for extra in 0..5 {
            let richer = Marking::from([("a", 2 + extra), ("b", 1 + extra), ("z", 0)]);
            assert!(t.is_enabled(&richer));
        }
    }

    #[test]
    fn rejects_zero_weight() {
        let err = Transition::new([("a", 0)], no_places(), no_places(), []).unwrap_err();
        assert_eq!(
            err,
            InvalidTransition::ZeroWeight {
                kind: ArcKind::Input,
                place: "\"a\"".to_string(),
            }
        );
    }

    #[test]
    fn rejects_duplicate_arc_of_same_kind() {
        let err = Transition::builder("dup")
            .inhibitor("a")
            .inhibitor("a")
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            InvalidTransition::DuplicateArc {
                kind: ArcKind::Inhibitor,
                ..
            }
        ));

        // the same place under different kinds is fine
        assert!(
            Transition::builder("ok")
                .input("a", 1)
                .output("a", 1)
                .reset("a")
                .build()
                .is_ok()
        );
    }

    #[test]
    fn clones_compare_equal() {
        let t = Transition::builder("t").input("a", 1).build().unwrap();
        let u = Transition::builder("t").input("a", 1).build().unwrap();
        let v = Transition::builder("v").input("a", 1).build().unwrap();
        assert_eq!(t, t.clone());
        assert_eq!(t, u);
        assert_ne!(t, v);
        assert_eq!(format!("{:?}", t), r#"Transition("t")"#);
        assert_eq!(t.name(), Some("t"));
    }
}
