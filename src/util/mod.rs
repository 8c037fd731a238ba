pub(crate) mod cancel;
pub(crate) mod rng;

pub(crate) use self::cancel::Cancellable;
