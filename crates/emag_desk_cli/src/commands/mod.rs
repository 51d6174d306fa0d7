pub(crate) mod calc;
pub(crate) mod estimate;
pub(crate) mod integration;
pub(crate) mod meta;
pub(crate) mod migrate;
pub(crate) mod shared;
pub(crate) mod status;
pub(crate) mod sync;
