//! Reference-counted bookkeeping of registered `(event, handler)` pairs.

use crate::value::Handler;
use hashbrown::{hash_map::Entry, HashMap};
use num_traits::{CheckedAdd, CheckedSub, One, Zero};
use thiserror::Error;
use tracing::trace;

/// One registration of `handler` for `event`.
pub type Listener = (String, Handler);

/// Counts how many live objects hold each [`Listener`].
///
/// Released listeners keep a zero-count entry until the next [`ListenerRegistry::collect`],
/// so that a handler moving between objects within one commit is never dropped in between.
pub struct ListenerRegistry<C = u16>
where
	C: CheckedAdd + CheckedSub + One + Zero,
{
	counts: HashMap<Listener, C>,
}

impl<C> Default for ListenerRegistry<C>
where
	C: CheckedAdd + CheckedSub + One + Zero,
{
	fn default() -> Self {
		Self { counts: HashMap::new() }
	}
}

/// A listener count left its range.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CountError {
	#[error("listener count saturated")]
	Saturated,
	#[error("listener released more often than it was retained")]
	Underflow,
}

impl<C> ListenerRegistry<C>
where
	C: CheckedAdd + CheckedSub + One + Zero,
{
	pub fn retain(&mut self, listener: &Listener) -> Result<(), CountError> {
		match self.counts.entry(listener.clone()) {
			Entry::Occupied(occupied) => {
				let count = occupied.into_mut();
				*count = count.checked_add(&C::one()).ok_or(CountError::Saturated)?;
			}
			Entry::Vacant(vacant) => {
				vacant.insert(C::one());
			}
		}
		Ok(())
	}

	/// Decrements the count of `listener`. The entry stays around at zero.
	pub fn release(&mut self, listener: &Listener) -> Result<(), CountError> {
		let count = self.counts.get_mut(listener).ok_or(CountError::Underflow)?;
		*count = count.checked_sub(&C::one()).ok_or(CountError::Underflow)?;
		Ok(())
	}

	/// Drops every zero-count entry and returns how many there were.
	pub fn collect(&mut self) -> usize {
		self.counts
			.extract_if(|_, count| count.is_zero())
			.inspect(|((event, _), _)| trace!(event = event.as_str(), "Collected listener."))
			.count()
	}

	/// Distinct listeners, released ones that weren't collected yet included.
	#[must_use]
	pub fn len(&self) -> usize {
		self.counts.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.counts.is_empty()
	}
}
