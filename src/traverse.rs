//! TraversalEngine: ordered scans over a store with early stop.
//!
//! Both scans resolve each entry's token back to its key through the
//! registry and hand `(value, key)` to a visitor. The visitor's [`Signal`]
//! decides whether the scan goes on. Neither scan changes storage order.

use crate::error::{Error, Result};
use crate::expr::Expression;
use crate::registry::KeyRegistry;
use crate::store::{OrderedStore, Position};
use crate::value::Value;
use log::{debug, trace};

/// What a visitor wants the scan to do next.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Signal {
    Continue,
    Stop,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Direction {
    Forward,
    Backward,
}

fn start(store: &OrderedStore, direction: Direction) -> Option<Position> {
    match direction {
        Direction::Forward => store.first(),
        Direction::Backward => store.last(),
    }
}

fn step(store: &OrderedStore, pos: Position, direction: Direction) -> Option<Position> {
    match direction {
        Direction::Forward => store.next(pos),
        Direction::Backward => store.prev(pos),
    }
}

/// Read-only scan. Returns `Ok(true)` when every entry was visited and
/// `Ok(false)` when the visitor stopped early. A visitor error ends the scan
/// and is returned as is.
pub(crate) fn scan<F>(
    registry: &KeyRegistry,
    store: &OrderedStore,
    direction: Direction,
    mut visit: F,
) -> Result<bool>
where
    F: FnMut(&Value, &Value) -> Result<Signal>,
{
    let mut cursor = start(store, direction);
    let mut visited = 0usize;
    while let Some(pos) = cursor {
        let Some((token, value)) = store.entry(pos) else {
            break;
        };
        let key = registry.resolve(token)?;
        visited += 1;
        if visit(value, key)? == Signal::Stop {
            trace!("{direction:?} scan stopped after {visited} of {} entries", store.len());
            return Ok(false);
        }
        cursor = step(store, pos, direction);
    }
    Ok(true)
}

/// Mutating scan. Each visit may rewrite its value in place; with a guard,
/// the rewritten value is checked before moving on, and a rejected value is
/// put back the way it was before the scan ends with the guard's error.
pub(crate) fn walk<F>(
    registry: &KeyRegistry,
    store: &mut OrderedStore,
    guard: Option<&Expression>,
    direction: Direction,
    mut visit: F,
) -> Result<bool>
where
    F: FnMut(&mut Value, &Value) -> Signal,
{
    let mut cursor = start(store, direction);
    while let Some(pos) = cursor {
        let Some((token, value)) = store.entry_mut(pos) else {
            break;
        };
        let key = registry.resolve(token)?;
        let before = guard.map(|_| value.clone());
        let signal = visit(&mut *value, key);
        if let (Some(guard), Some(before)) = (guard, before) {
            if let Err(e) = check_guard(guard, value, key) {
                *value = before;
                return Err(e);
            }
        }
        if signal == Signal::Stop {
            trace!("{direction:?} walk stopped early");
            return Ok(false);
        }
        cursor = step(store, pos, direction);
    }
    Ok(true)
}

/// Runs `guard` over a pending write. Only an exact `false` rejects.
pub(crate) fn check_guard(guard: &Expression, value: &Value, key: &Value) -> Result<()> {
    if guard.evaluate(&[value, key])?.passes() {
        Ok(())
    } else {
        debug!("guard rejected {value} for key {key}");
        Err(Error::GuardRejected(key.to_string()))
    }
}
