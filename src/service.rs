use std::time::Duration;

use thiserror::Error;

/// Fallos de los servicios externos. Nunca salen de `rephrase`/`speak`:
/// se registran y se degrada al comportamiento local.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("credencial ausente")]
    MissingCredential,

    #[error("HTTP error: {0}")]
    Http(#[from] ureq::Error),

    #[error("respuesta HTTP {0}")]
    Status(u16),

    #[error("respuesta vacía")]
    EmptyResponse,

    #[error("error de audio: {0}")]
    Audio(String),

    #[error("cancelado")]
    Cancelled,
}

impl ServiceError {
    /// `ureq` devuelve los códigos no-2xx como error; los normalizamos a `Status`
    pub fn from_ureq(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => ServiceError::Status(code),
            other => ServiceError::Http(other),
        }
    }
}

/// Un agente HTTP por cliente, con timeout global
pub fn build_agent(timeout_secs: u64) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(timeout_secs)))
        .build();
    config.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_is_normalized() {
        assert!(matches!(
            ServiceError::from_ureq(ureq::Error::StatusCode(503)),
            ServiceError::Status(503)
        ));
    }
}

/// Servidor HTTP de una sola petición para los tests de los clientes
#[cfg(test)]
pub(crate) mod test_server {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Responde una vez con `status` y `body`. El handle devuelve la
    /// cabecera de la petición recibida (en minúsculas).
    pub fn respond_once(
        status: &'static str,
        content_type: &'static str,
        body: Vec<u8>,
    ) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut head = String::new();
            let mut content_length = 0usize;
            let mut chunked = false;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 || line.trim().is_empty() {
                    break;
                }
                let lower = line.to_ascii_lowercase();
                if let Some(value) = lower.strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap();
                }
                if lower.starts_with("transfer-encoding:") && lower.contains("chunked") {
                    chunked = true;
                }
                head.push_str(&lower);
            }

            // Consumir el cuerpo antes de responder
            if chunked {
                loop {
                    let mut size_line = String::new();
                    reader.read_line(&mut size_line).unwrap();
                    let size = usize::from_str_radix(size_line.trim(), 16).unwrap_or(0);
                    let mut chunk = vec![0u8; size + 2];
                    reader.read_exact(&mut chunk).unwrap();
                    if size == 0 {
                        break;
                    }
                }
            } else {
                let mut request_body = vec![0u8; content_length];
                reader.read_exact(&mut request_body).unwrap();
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                content_type,
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            stream.write_all(&body).unwrap();
            stream.flush().unwrap();
            head
        });

        (url, handle)
    }
}
