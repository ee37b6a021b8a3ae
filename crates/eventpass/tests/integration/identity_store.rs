/*
 *  Copyright 2025 Eventpass Developers
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Persistent identity behaviour through the issuer.

use eventpass::crypto::certificate_from_pem;
use eventpass::security::{FileIdentityStore, IdentityProvider, PRIVATE_KEY_FILE};
use eventpass::{verify_pass_archive, IdentityMode, IssuerConfig, PassIssuer};
use serial_test::serial;
use tempfile::TempDir;

use crate::fixtures::kai_request;

#[tokio::test]
async fn test_persistent_identity_signs_every_pass() {
    let dir = TempDir::new().unwrap();
    let config = IssuerConfig::builder()
        .identity_mode(IdentityMode::Persistent)
        .store_dir(dir.path().join("identity"))
        .build()
        .unwrap();
    let issuer = PassIssuer::from_config(config).unwrap();

    let first = issuer
        .issue(kai_request(dir.path().join("a.pkpass")))
        .await
        .unwrap();
    let second = issuer
        .issue(kai_request(dir.path().join("b.pkpass")))
        .await
        .unwrap();
    assert_eq!(first.certificate_fingerprint, second.certificate_fingerprint);

    // The certificate exported from the store verifies passes from any run.
    let store = FileIdentityStore::new(dir.path().join("identity"), "Test Certificate");
    let exported = dir.path().join("issuer.pem");
    store.export_certificate(&exported).await.unwrap();
    let certificate = certificate_from_pem(&std::fs::read_to_string(&exported).unwrap()).unwrap();

    assert!(verify_pass_archive(&first.output, &certificate).is_ok());
    assert!(verify_pass_archive(&second.output, &certificate).is_ok());
}

#[tokio::test]
async fn test_concurrent_first_use_generates_one_identity() {
    let dir = TempDir::new().unwrap();
    let config = IssuerConfig::builder()
        .identity_mode(IdentityMode::Persistent)
        .store_dir(dir.path().join("identity"))
        .max_concurrent_issuances(3)
        .build()
        .unwrap();
    let issuer = PassIssuer::from_config(config).unwrap();

    let requests = (0..3)
        .map(|i| kai_request(dir.path().join(format!("pass-{i}.pkpass"))))
        .collect();
    let results = issuer.issue_batch(requests).await;

    let fingerprints: Vec<_> = results
        .into_iter()
        .map(|r| r.unwrap().certificate_fingerprint)
        .collect();
    assert!(fingerprints.windows(2).all(|w| w[0] == w[1]));
    assert!(dir.path().join("identity").join(PRIVATE_KEY_FILE).is_file());
}

#[tokio::test]
#[serial]
async fn test_encrypted_store_from_config() {
    let dir = TempDir::new().unwrap();
    let var = "EVENTPASS_INTEGRATION_KEK";
    std::env::set_var(var, "0f".repeat(32));

    let config = IssuerConfig::builder()
        .identity_mode(IdentityMode::Persistent)
        .store_dir(dir.path())
        .encryption_key_env(var)
        .build()
        .unwrap();

    let store = config.identity().file_store().unwrap();
    let identity = store.signing_identity().await.unwrap();
    assert!(dir.path().join("signing_key.enc").is_file());
    assert!(!dir.path().join(PRIVATE_KEY_FILE).exists());

    let reopened = config.identity().file_store().unwrap();
    assert_eq!(
        reopened.load().await.unwrap().unwrap().fingerprint(),
        identity.fingerprint()
    );

    std::env::remove_var(var);
}
