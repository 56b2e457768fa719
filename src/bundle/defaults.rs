//! Built-in addon bundles
//!
//! Used when no bundle file is given on the command line.

/// Embedded bundle files as `(name, yaml)` pairs, in load order
pub const EMBEDDED_BUNDLES: &[(&str, &str)] = &[
    (
        "cert-manager.yaml",
        include_str!("embedded/cert-manager.yaml"),
    ),
    (
        "ingress-nginx.yaml",
        include_str!("embedded/ingress-nginx.yaml"),
    ),
    (
        "metrics-server.yaml",
        include_str!("embedded/metrics-server.yaml"),
    ),
];
