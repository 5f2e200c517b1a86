// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// A trait that handles the loading / saving and validity of configuration information for
/// components that read their settings from a file.
pub trait Config: serde::Serialize {
    fn save(&self, path: &Path) -> Result<(), ()> {
        if !self.is_valid() {
            error!("Config isn't valid and won't be saved");
            return Err(());
        }
        let s = serde_yaml::to_string(&self).map_err(|_| ())?;
        if let Ok(mut f) = File::create(path) {
            if f.write_all(s.as_bytes()).is_ok() {
                return Ok(());
            }
            error!("Could not save config to {}", path.display());
        } else {
            error!("Cannot create the path to save the config");
        }
        Err(())
    }

    fn load<A>(path: &Path) -> Result<A, ()>
    where
        A: Config + serde::de::DeserializeOwned,
    {
        if let Ok(mut f) = File::open(path) {
            let mut s = String::new();
            if f.read_to_string(&mut s).is_ok() {
                if let Ok(config) = serde_yaml::from_str(&s) {
                    return Ok(config);
                }
            }
        }
        Err(())
    }

    fn is_valid(&self) -> bool;
}
