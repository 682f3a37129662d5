pub(crate) mod data;
pub(crate) mod plan;
pub(crate) mod record;
pub(crate) mod run;
pub(crate) mod signal;
pub(crate) mod stable;
// Only reachable from within the compounder, plans are driven through `run`.
pub(in crate::compounder) mod executable;
pub(in crate::compounder) mod lock;

#[cfg(test)]
mod testing;
#[cfg(test)]
mod tests;

pub use executable::NextTick;
