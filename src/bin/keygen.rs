// Copyright (c) 2026 Ddns-node Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

//! Generates a fresh secp256r1 identity key pair and writes the private key
//! (raw PKCS#8 DER) to `<out_dir>/validator.key`, the same path and format
//! [`ddns_node::core::security::keystore::Keystore::open`] loads on node
//! startup, printing the base64 public key.

use anyhow::Result;
use std::path::PathBuf;

use ddns_node::core::identity;

fn main() -> Result<()> {
    let out_dir = std::env::args().nth(1).unwrap_or_else(|| "data".to_string());
    let mut key_path = PathBuf::from(out_dir);
    std::fs::create_dir_all(&key_path)?;
    key_path.push("validator.key");

    let (public_key, private_key) = identity::generate_keypair();
    let der = identity::encode_private_key_der(&private_key).map_err(|_| anyhow::anyhow!("key encoding failed"))?;
    std::fs::write(&key_path, &der)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600));
    }

    println!("{}", identity::encode_public_key(&public_key));
    Ok(())
}
