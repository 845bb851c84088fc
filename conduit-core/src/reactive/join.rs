//! Join Implementation
//!
//! A join combines several independent emitters into one emitter of a tuple.
//!
//! Every source must be present when the join is built; if any is `None`
//! the join itself is `None`. Presence is checked once and never revisited.
//!
//! The joined cell starts empty. Each source listener writes its own slot and
//! then sets the whole tuple, so the join emits on every single source
//! emission, including while some slots are still `None`. Consumers that
//! need a complete tuple should pipe it through their own filter.
//!
//! Completing the joined cell (normally because its last listener left)
//! unsubscribes from every source. Each source owns the joined cell through
//! its listener, so the join stays reachable while any source is.

use std::sync::Arc;

use smallvec::{smallvec, SmallVec};
use tracing::trace;

use super::cell::{CellCore, CellOptions, CellValue};
use super::emitter::{Emitter, Listenable};
use super::listener::Subscription;

type Sources = SmallVec<[Subscription; 4]>;
type Pair<A, B> = (Option<A>, Option<B>);
type Triple<A, B, C> = (Option<A>, Option<B>, Option<C>);

/// Join any number of emitters of the same type.
pub fn join<T: CellValue>(sources: &[Option<Emitter<T>>]) -> Option<Emitter<Vec<Option<T>>>> {
    let present: Vec<&Emitter<T>> = sources.iter().map(Option::as_ref).collect::<Option<_>>()?;

    let options = present
        .first()
        .map(|source| source.core().options().derive(false, None))
        .unwrap_or_else(CellOptions::new);
    let joined = CellCore::new(None, options);

    let width = present.len();
    let subscriptions: Sources = present
        .iter()
        .copied()
        .enumerate()
        .map(|(slot, source)| {
            write_slot(
                source,
                &joined,
                move || vec![None; width],
                move |slots: &mut Vec<Option<T>>, value: &T| slots[slot] = Some(value.clone()),
            )
        })
        .collect();

    release_on_complete(&joined, subscriptions);
    Some(Emitter::from_core(joined))
}

/// Join two emitters of possibly different types.
pub fn join2<A, B>(
    a: Option<&Emitter<A>>,
    b: Option<&Emitter<B>>,
) -> Option<Emitter<Pair<A, B>>>
where
    A: CellValue,
    B: CellValue,
{
    let (a, b) = (a?, b?);
    let joined = CellCore::new(None, a.core().options().derive(false, None));

    let subscriptions: Sources = smallvec![
        write_slot(a, &joined, Default::default, |slots: &mut Pair<A, B>, v: &A| {
            slots.0 = Some(v.clone())
        }),
        write_slot(b, &joined, Default::default, |slots: &mut Pair<A, B>, v: &B| {
            slots.1 = Some(v.clone())
        }),
    ];

    release_on_complete(&joined, subscriptions);
    Some(Emitter::from_core(joined))
}

/// Join three emitters of possibly different types.
pub fn join3<A, B, C>(
    a: Option<&Emitter<A>>,
    b: Option<&Emitter<B>>,
    c: Option<&Emitter<C>>,
) -> Option<Emitter<Triple<A, B, C>>>
where
    A: CellValue,
    B: CellValue,
    C: CellValue,
{
    let (a, b, c) = (a?, b?, c?);
    let joined = CellCore::new(None, a.core().options().derive(false, None));

    let subscriptions: Sources = smallvec![
        write_slot(a, &joined, Default::default, |slots: &mut Triple<A, B, C>, v: &A| {
            slots.0 = Some(v.clone())
        }),
        write_slot(b, &joined, Default::default, |slots: &mut Triple<A, B, C>, v: &B| {
            slots.1 = Some(v.clone())
        }),
        write_slot(c, &joined, Default::default, |slots: &mut Triple<A, B, C>, v: &C| {
            slots.2 = Some(v.clone())
        }),
    ];

    release_on_complete(&joined, subscriptions);
    Some(Emitter::from_core(joined))
}

/// Subscribe `joined` to `source`, writing each value into one slot.
fn write_slot<S, J, E, W>(
    source: &Emitter<S>,
    joined: &Arc<CellCore<J>>,
    blank: E,
    write: W,
) -> Subscription
where
    S: CellValue,
    J: CellValue,
    E: Fn() -> J + Send + Sync + 'static,
    W: Fn(&mut J, &S) + Send + Sync + 'static,
{
    let sink = Arc::clone(joined);
    source.listen(move |value: &S| {
        sink.apply(|previous| {
            let mut slots = previous.unwrap_or_else(&blank);
            write(&mut slots, value);
            Some(slots)
        });
    })
}

fn release_on_complete<J: CellValue>(joined: &Arc<CellCore<J>>, subscriptions: Sources) {
    let id = joined.id();
    joined.set_cleanup(move || {
        trace!(cell = %id, sources = subscriptions.len(), "join releasing its sources");
        for subscription in &subscriptions {
            subscription.unsubscribe();
        }
    });
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
