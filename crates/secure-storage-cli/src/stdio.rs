//! Line-delimited JSON host
//!
//! Reads one `Request` per line and writes one `Response` per line. Lines
//! that do not parse get an `INVALID_REQUEST` error response; the loop ends
//! at EOF.

use std::io::{self, BufRead, Write};
use tracing::{debug, error, info};

use secure_storage_core::{ErrorKind, Request, Response, SecureStorageFacade};

/// Serve requests from `reader` until EOF; returns the number handled
pub fn serve<R: BufRead, W: Write>(
    facade: &SecureStorageFacade,
    reader: R,
    mut writer: W,
) -> io::Result<usize> {
    let mut handled = 0;

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(line) {
            Ok(request) => {
                debug!("Received {:?} for '{}'", request.operation, request.alias);
                facade.handle(request)
            }
            Err(e) => {
                error!("Failed to parse request: {}", e);
                Response::Error {
                    kind: ErrorKind::InvalidRequest,
                    message: format!("Malformed request: {}", e),
                    alias: None,
                    backend: None,
                }
            }
        };

        serde_json::to_writer(&mut writer, &response)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        handled += 1;
    }

    info!("EOF received after {} requests", handled);
    Ok(handled)
}

/// Request loop bound to the process's stdin and stdout
pub struct StdioHost {
    facade: SecureStorageFacade,
}

impl StdioHost {
    pub fn new(facade: SecureStorageFacade) -> Self {
        Self { facade }
    }

    /// Run until stdin closes
    pub fn run(&self) -> io::Result<usize> {
        info!("Serving requests on stdio");
        let stdin = io::stdin();
        let stdout = io::stdout();
        serve(&self.facade, stdin.lock(), stdout.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secure_storage_core::platform::memory::StaticKeyChain;
    use secure_storage_core::platform::AesGcmEntityCipher;
    use secure_storage_core::{BackendRegistry, RegistryConfig, SharedKeyBackend};
    use std::sync::Arc;

    fn facade() -> SecureStorageFacade {
        let cipher = AesGcmEntityCipher::new(Arc::new(StaticKeyChain::random()));
        SecureStorageFacade::new(BackendRegistry::new(
            RegistryConfig::new(16).register(Arc::new(SharedKeyBackend::new(Arc::new(cipher)))),
        ))
    }

    fn responses(output: &[u8]) -> Vec<Response> {
        String::from_utf8(output.to_vec())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_one_response_per_request() {
        let facade = facade();
        let input = concat!(
            r#"{"operation":"encrypt","alias":"token","value":{"text":"abc"}}"#,
            "\n\n",
            r#"{"operation":"removeKey","alias":"token"}"#,
            "\n",
        );
        let mut output = Vec::new();

        let handled = serve(&facade, input.as_bytes(), &mut output).unwrap();
        assert_eq!(handled, 2);

        let responses = responses(&output);
        assert!(matches!(
            &responses[0],
            Response::Encrypted { backend, .. } if backend == SharedKeyBackend::NAME
        ));
        assert_eq!(
            responses[1],
            Response::Removed {
                alias: "token".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_line_keeps_serving() {
        let facade = facade();
        let input = "not json\n{\"operation\":\"encrypt\",\"alias\":\"a\",\"value\":{\"text\":\"b\"},\"level\":\"SECURE_HARDWARE\"}\n";
        let mut output = Vec::new();

        serve(&facade, input.as_bytes(), &mut output).unwrap();

        let responses = responses(&output);
        assert_eq!(responses.len(), 2);
        assert!(matches!(
            &responses[0],
            Response::Error { kind: ErrorKind::InvalidRequest, .. }
        ));
        assert!(matches!(
            &responses[1],
            Response::Error { kind: ErrorKind::NoEligibleBackend, .. }
        ));
    }
}
