#[macro_export]
macro_rules! include_res {
    (bytes, $p:expr) => {
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
    (str, $p:expr) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
}

/// Schema migrations, applied in order on startup. Every statement is idempotent.
pub const MIGRATIONS: &[(&str, &str)] = &[
    ("001_init", include_res!(str, "/migrations/001_init.sql")),
];
