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

//! End-to-end issuance tests.

use std::sync::Arc;

use eventpass::content::ContentStore;
use eventpass::packaging::{read_archive, ArchiveError, ManifestError};
use eventpass::pipeline::stages;
use eventpass::security::audit::events;
use eventpass::{
    verify_pass_archive, ContentError, DigestAlgorithm, EphemeralIdentityProvider, IssuanceErrorKind,
    IssuerConfig, Manifest, ManifestBuilder, PassIssuer, PassTemplate, PipelineStage, ResourceName,
    ResourceSource, StaticIdentityProvider,
};
use tempfile::TempDir;
use tracing_test::traced_test;

use crate::fixtures::{kai_holder, kai_request, placeholder_image, IDENTITY};

fn static_issuer(config: IssuerConfig) -> PassIssuer {
    PassIssuer::new(
        config,
        Arc::new(StaticIdentityProvider::from_arc(IDENTITY.clone())),
    )
}

#[tokio::test]
async fn test_kai_comic_con_pass() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("KAI2025-CCON.pkpass");

    let issued = static_issuer(IssuerConfig::default())
        .issue(kai_request(output.clone()))
        .await
        .unwrap();

    let archive = read_archive(&output).unwrap();
    assert_eq!(
        archive.entry_names(),
        ["pass.json", "icon.png", "logo.png", "manifest.json", "signature"]
    );

    let manifest = Manifest::from_bytes(archive.manifest_bytes().unwrap()).unwrap();
    assert_eq!(manifest.len(), 3);
    assert_eq!(manifest, issued.manifest);
    for name in ResourceName::ALL {
        let recomputed = DigestAlgorithm::Sha1.hex_digest(archive.resource(name).unwrap());
        assert_eq!(manifest.digest_for(name), Some(recomputed.as_str()));
    }

    let public_key = eventpass::crypto::public_key_from_certificate(&issued.certificate).unwrap();
    eventpass::verify_manifest_signature(
        &public_key,
        archive.manifest_bytes().unwrap(),
        archive.signature_bytes().unwrap(),
    )
    .unwrap();

    let definition: serde_json::Value =
        serde_json::from_slice(archive.resource(ResourceName::PassDefinition).unwrap()).unwrap();
    assert_eq!(definition["serialNumber"], "KAI2025-CCON");
    assert_eq!(definition["barcode"]["message"], "KAI2025-CCON");
    assert_eq!(definition["barcode"]["format"], "PKBarcodeFormatQR");
    assert_eq!(definition["organizationName"], "Kai Events");
    assert_eq!(definition["eventTicket"]["primaryFields"][0]["value"], "Comic Con 2025");
}

#[test]
fn test_missing_logo_fails_manifest_and_produces_nothing() {
    let content = stages::assemble_content(
        &PassTemplate::default(),
        &kai_holder(),
        ResourceSource::Bytes(placeholder_image(0xAA)),
        ResourceSource::Bytes(placeholder_image(0x55)),
    )
    .unwrap();
    let mut store: ContentStore = content.store;
    store.remove(ResourceName::Logo);

    let result = ManifestBuilder::default().build(&store);
    assert!(matches!(
        result,
        Err(ManifestError::Content(ContentError::ResourceUnavailable {
            resource: ResourceName::Logo,
            ..
        }))
    ));
}

#[tokio::test]
async fn test_missing_logo_file_leaves_no_archive() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("KAI2025-CCON.pkpass");
    let mut request = kai_request(output.clone());
    request.logo = ResourceSource::File(dir.path().join("logo.png"));

    let err = static_issuer(IssuerConfig::default())
        .issue(request)
        .await
        .unwrap_err();

    assert_eq!(err.stage, PipelineStage::ManifestConstruction);
    assert!(err.is_resource_unavailable());
    assert!(!output.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_packaging_failure_leaves_no_archive() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("KAI2025-CCON.pkpass");
    std::fs::create_dir(&output).unwrap();
    std::fs::write(output.join("occupant"), b"x").unwrap();
    let config = IssuerConfig::builder().overwrite(true).build().unwrap();

    let err = static_issuer(config)
        .issue(kai_request(output.clone()))
        .await
        .unwrap_err();

    assert_eq!(err.stage, PipelineStage::Packaging);
    assert!(matches!(
        err.kind,
        IssuanceErrorKind::PackagingFailure(ArchiveError::Persist { .. })
    ));
    assert!(output.is_dir());
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name != "KAI2025-CCON.pkpass")
        .collect();
    assert!(leftovers.is_empty(), "unexpected files: {leftovers:?}");
}

#[tokio::test]
async fn test_file_backed_resources() {
    let dir = TempDir::new().unwrap();
    let icon = dir.path().join("icon.png");
    let logo = dir.path().join("logo.png");
    std::fs::write(&icon, placeholder_image(1)).unwrap();
    std::fs::write(&logo, placeholder_image(2)).unwrap();

    let mut request = kai_request(dir.path().join("out").join("pass.pkpass"));
    request.icon = ResourceSource::File(icon);
    request.logo = ResourceSource::File(logo);

    let issued = static_issuer(IssuerConfig::default())
        .issue(request)
        .await
        .unwrap();

    let archive = read_archive(&issued.output).unwrap();
    assert_eq!(
        archive.resource(ResourceName::Icon).unwrap(),
        placeholder_image(1).as_slice()
    );
}

#[tokio::test]
async fn test_sha256_manifest_verifies() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("sha256.pkpass");
    let config = IssuerConfig::builder()
        .digest(DigestAlgorithm::Sha256)
        .build()
        .unwrap();

    let issued = static_issuer(config)
        .issue(kai_request(output.clone()))
        .await
        .unwrap();

    assert_eq!(issued.manifest.algorithm(), DigestAlgorithm::Sha256);
    let verified = verify_pass_archive(&output, &issued.certificate).unwrap();
    assert_eq!(verified.digest_algorithm, DigestAlgorithm::Sha256);
}

#[tokio::test]
async fn test_ephemeral_identities_differ_per_issuance() {
    let dir = TempDir::new().unwrap();
    let issuer = PassIssuer::new(
        IssuerConfig::default(),
        Arc::new(EphemeralIdentityProvider::new("Test Certificate")),
    );

    let first = issuer
        .issue(kai_request(dir.path().join("a.pkpass")))
        .await
        .unwrap();
    let second = issuer
        .issue(kai_request(dir.path().join("b.pkpass")))
        .await
        .unwrap();

    assert_ne!(first.certificate_fingerprint, second.certificate_fingerprint);
    assert!(verify_pass_archive(&first.output, &first.certificate).is_ok());
    assert!(verify_pass_archive(&first.output, &second.certificate).is_err());
}

#[traced_test]
#[tokio::test]
async fn test_issuance_emits_audit_events() {
    let dir = TempDir::new().unwrap();
    let issuer = static_issuer(IssuerConfig::default());

    issuer
        .issue(kai_request(dir.path().join("ok.pkpass")))
        .await
        .unwrap();

    let mut failing = kai_request(dir.path().join("bad.pkpass"));
    failing.icon = ResourceSource::Bytes(Vec::new());
    assert!(issuer.issue(failing).await.is_err());

    assert!(logs_contain(events::PASS_ISSUED));
    assert!(logs_contain(events::PASS_ISSUE_FAILURE));
    assert!(logs_contain("manifest_construction"));
}
