//! Default values for configuration fields.
//!
//! Each function backs both the serde `default` attribute and the
//! `educe`-derived `Default` implementation of its section.

pub mod build {
    use std::path::PathBuf;

    pub fn input() -> PathBuf {
        PathBuf::from("./")
    }

    pub fn output() -> PathBuf {
        PathBuf::from("public")
    }
}

pub mod pdf {
    pub fn renderer() -> String {
        "wkhtmltopdf".to_owned()
    }

    pub const fn javascript_delay() -> u32 {
        2000
    }
}

pub mod math {
    use std::path::PathBuf;

    pub fn katex_assets() -> PathBuf {
        PathBuf::from("katex")
    }
}
