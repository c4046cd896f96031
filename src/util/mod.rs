pub(crate) mod backoff;

pub(crate) use backoff::Backoff;
