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

//! Audit logging for pass issuance and verification.
//!
//! This module provides structured audit events for security-sensitive operations:
//! - Pass issuance (success/failure)
//! - Signing identity generation and loading
//! - Manifest signing
//! - Archive verification
//!
//! Every event carries a stable `event_type` field so log pipelines can
//! filter on it. Events are emitted through `tracing` at appropriate levels.

/// Event types for issuance and verification.
pub mod events {
    /// Pass issued event type.
    pub const PASS_ISSUED: &str = "pass.issued";
    /// Pass issuance failure event type.
    pub const PASS_ISSUE_FAILURE: &str = "pass.issue.failure";

    /// Signing identity generated event type.
    pub const IDENTITY_GENERATED: &str = "identity.generated";
    /// Signing identity loaded from a store event type.
    pub const IDENTITY_LOADED: &str = "identity.loaded";
    /// Certificate exported event type.
    pub const IDENTITY_CERTIFICATE_EXPORTED: &str = "identity.certificate.exported";

    /// Manifest signed event type.
    pub const MANIFEST_SIGNED: &str = "manifest.signed";

    /// Archive verification success event type.
    pub const ARCHIVE_VERIFIED: &str = "archive.verified";
    /// Archive verification failure event type.
    pub const ARCHIVE_VERIFY_FAILURE: &str = "archive.verify.failure";
}

/// Log a successfully issued pass.
pub fn log_pass_issued(
    issuance_id: &str,
    serial_number: &str,
    output_path: &str,
    archive_checksum: &str,
    certificate_fingerprint: &str,
) {
    tracing::info!(
        event_type = events::PASS_ISSUED,
        issuance_id = %issuance_id,
        serial_number = %serial_number,
        output_path = %output_path,
        archive_checksum = %archive_checksum,
        certificate_fingerprint = %certificate_fingerprint,
        "Pass issued"
    );
}

/// Log a failed issuance.
pub fn log_pass_issue_failed(
    issuance_id: &str,
    serial_number: Option<&str>,
    stage: &str,
    error: &str,
) {
    tracing::error!(
        event_type = events::PASS_ISSUE_FAILURE,
        issuance_id = %issuance_id,
        serial_number = serial_number.unwrap_or("<unknown>"),
        stage = %stage,
        error = %error,
        "Pass issuance failed"
    );
}

/// Log generation of a new signing identity.
pub fn log_identity_generated(certificate_fingerprint: &str, subject: &str, persisted: bool) {
    tracing::info!(
        event_type = events::IDENTITY_GENERATED,
        certificate_fingerprint = %certificate_fingerprint,
        subject = %subject,
        persisted = persisted,
        "Signing identity generated"
    );
}

/// Log loading of a persisted signing identity.
pub fn log_identity_loaded(certificate_fingerprint: &str, store_path: &str, encrypted: bool) {
    tracing::info!(
        event_type = events::IDENTITY_LOADED,
        certificate_fingerprint = %certificate_fingerprint,
        store_path = %store_path,
        encrypted = encrypted,
        "Signing identity loaded"
    );
}

/// Log a certificate export.
pub fn log_certificate_exported(certificate_fingerprint: &str, output_path: &str) {
    tracing::info!(
        event_type = events::IDENTITY_CERTIFICATE_EXPORTED,
        certificate_fingerprint = %certificate_fingerprint,
        output_path = %output_path,
        "Certificate exported"
    );
}

/// Log a manifest signature.
pub fn log_manifest_signed(serial_number: &str, manifest_hash: &str, certificate_fingerprint: &str) {
    tracing::debug!(
        event_type = events::MANIFEST_SIGNED,
        serial_number = %serial_number,
        manifest_hash = %manifest_hash,
        certificate_fingerprint = %certificate_fingerprint,
        "Manifest signed"
    );
}

/// Log a successful archive verification.
pub fn log_archive_verified(archive: &str, serial_number: Option<&str>, signer_fingerprint: &str) {
    tracing::info!(
        event_type = events::ARCHIVE_VERIFIED,
        archive = %archive,
        serial_number = serial_number.unwrap_or("<unknown>"),
        signer_fingerprint = %signer_fingerprint,
        "Pass archive verified"
    );
}

/// Log a failed archive verification.
pub fn log_archive_verify_failed(archive: &str, failure_reason: &str, signer_fingerprint: &str) {
    tracing::warn!(
        event_type = events::ARCHIVE_VERIFY_FAILURE,
        archive = %archive,
        failure_reason = %failure_reason,
        signer_fingerprint = %signer_fingerprint,
        "Pass archive verification failed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct StringWriter(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for StringWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for StringWriter {
        type Writer = StringWriter;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn with_captured_logs<F>(f: F) -> String
    where
        F: FnOnce(),
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let writer = StringWriter(buffer.clone());

        let subscriber = tracing_subscriber::fmt()
            .with_writer(writer)
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();

        tracing::subscriber::with_default(subscriber, f);

        let output = buffer.lock().unwrap().clone();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_log_pass_issued() {
        let output = with_captured_logs(|| {
            log_pass_issued("id-1", "KAI2025-CCON", "/tmp/t.pkpass", "abc", "fp123");
        });

        assert!(output.contains(events::PASS_ISSUED));
        assert!(output.contains("KAI2025-CCON"));
        assert!(output.contains("fp123"));
    }

    #[test]
    fn test_log_pass_issue_failed_without_serial() {
        let output = with_captured_logs(|| {
            log_pass_issue_failed("id-2", None, "content", "logo.png missing");
        });

        assert!(output.contains(events::PASS_ISSUE_FAILURE));
        assert!(output.contains("<unknown>"));
        assert!(output.contains("logo.png missing"));
    }

    #[test]
    fn test_log_identity_events() {
        let output = with_captured_logs(|| {
            log_identity_generated("fp-gen", "CN=Test Certificate", false);
            log_identity_loaded("fp-load", "/var/lib/eventpass", true);
        });

        assert!(output.contains(events::IDENTITY_GENERATED));
        assert!(output.contains(events::IDENTITY_LOADED));
        assert!(output.contains("persisted"));
        assert!(output.contains("encrypted"));
    }

    #[test]
    fn test_log_manifest_signed_at_debug() {
        let output = with_captured_logs(|| {
            log_manifest_signed("S1", "hash", "fp");
        });

        assert!(output.contains(events::MANIFEST_SIGNED));
        assert!(output.contains("DEBUG"));
    }

    #[test]
    fn test_log_archive_verify_failed() {
        let output = with_captured_logs(|| {
            log_archive_verify_failed("ticket.pkpass", "tampered_resource", "fp");
        });

        assert!(output.contains(events::ARCHIVE_VERIFY_FAILURE));
        assert!(output.contains("tampered_resource"));
        assert!(output.contains("WARN"));
    }

    #[test]
    fn test_event_type_constants() {
        assert!(events::PASS_ISSUED.starts_with("pass."));
        assert!(events::PASS_ISSUE_FAILURE.starts_with("pass."));
        assert!(events::IDENTITY_GENERATED.starts_with("identity."));
        assert!(events::ARCHIVE_VERIFIED.starts_with("archive."));
    }
}
