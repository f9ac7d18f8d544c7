pub const NAME: &str = env!("CARGO_PKG_NAME");

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const REVISION: Option<&str> = option_env!("POSTTEST_REVISION");

pub const BUILD_TIMESTAMP: Option<&str> = option_env!("POSTTEST_BUILD_TIMESTAMP");
