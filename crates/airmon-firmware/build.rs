//! Bakes the network and cloud credentials into the binary.
//!
//! Values come from the environment, or from a `.env` file next to this
//! crate when present.

const KEYS: [&str; 4] = [
    "AIRMON_WIFI_SSID",
    "AIRMON_WIFI_PASSWORD",
    "AIRMON_DEVICE_ID",
    "AIRMON_ACCESS_TOKEN",
];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    if let Err(e) = dotenvy::dotenv() {
        println!("cargo:warning=no .env loaded ({e}), using the build environment");
    }

    for key in KEYS {
        println!("cargo:rerun-if-env-changed={key}");
        match std::env::var(key) {
            Ok(value) => println!("cargo:rustc-env={key}={value}"),
            Err(_) => panic!("{key} must be set in .env or the environment"),
        }
    }
}
