//! FTP/FTPS publishing
//!
//! The blocking `suppaftp` client runs on the blocking thread pool. The
//! artifact's directory tree is mirrored below the path of the destination
//! URL; missing remote directories are created on the way.
//!
//! TLS on port 990 is implicit (the handshake starts right after connecting);
//! on any other port the session is upgraded with `AUTH TLS`.

use crate::config::DeploymentConfig;
use crate::domain::{ArtifactFile, CourierError, DeploymentArtifact, DeploymentError, Result};
use secrecy::ExposeSecret;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use suppaftp::types::FileType;
use suppaftp::{FtpError, NativeTlsConnector, NativeTlsFtpStream};
use tokio_util::sync::CancellationToken;
use url::Url;

const DEFAULT_PORT: u16 = 21;
const DEFAULT_SECURE_PORT: u16 = 990;

/// Connection parameters taken from a destination URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpTarget {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    /// Remote directory, always starting with `/`
    pub root: String,
}

impl FtpTarget {
    /// Parse `ftp://` or `ftps://` URLs; a bare host is read as `ftp://`
    ///
    /// `use_ssl` upgrades a plain `ftp://` URL to TLS. Without an explicit
    /// port, TLS connections use 990 and plain ones 21.
    pub fn parse(raw: &str, use_ssl: bool) -> Result<Self> {
        let raw = raw.trim();
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("ftp://{raw}"))
                .map_err(|e| invalid(raw, &e.to_string()))?,
            Err(e) => return Err(invalid(raw, &e.to_string())),
        };

        let secure = match url.scheme() {
            "ftp" => use_ssl,
            "ftps" => true,
            other => return Err(invalid(raw, &format!("unsupported scheme '{other}'"))),
        };
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid(raw, "missing host"))?
            .to_string();
        let port = url.port().unwrap_or(if secure {
            DEFAULT_SECURE_PORT
        } else {
            DEFAULT_PORT
        });

        let path = url.path().trim_end_matches('/');
        let root = if path.is_empty() {
            "/".to_string()
        } else {
            path.to_string()
        };

        Ok(Self {
            host,
            port,
            secure,
            root,
        })
    }

    /// Whether TLS starts on connect instead of after `AUTH TLS`
    pub fn implicit_tls(&self) -> bool {
        self.secure && self.port == DEFAULT_SECURE_PORT
    }

    /// Remote path of an artifact file
    pub fn remote_path(&self, relative_path: &str) -> String {
        if self.root == "/" {
            format!("/{relative_path}")
        } else {
            format!("{}/{relative_path}", self.root)
        }
    }
}

fn invalid(raw: &str, reason: &str) -> CourierError {
    DeploymentError::InvalidDestination(format!("FTP url '{raw}': {reason}")).into()
}

/// Directories leading to `remote_path`, outermost first
fn parent_dirs(remote_path: &str) -> Vec<String> {
    let segments: Vec<&str> = remote_path
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    let mut dirs = Vec::new();
    let mut current = String::new();
    for segment in segments.iter().take(segments.len().saturating_sub(1)) {
        current.push('/');
        current.push_str(segment);
        dirs.push(current.clone());
    }
    dirs
}

struct Credentials {
    username: String,
    password: String,
}

/// Uploads artifact files to an FTP server
pub struct FtpPublisher {
    timeout: Duration,
}

impl FtpPublisher {
    pub fn new(timeout_seconds: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_seconds),
        }
    }

    pub async fn publish(
        &self,
        destination: &DeploymentConfig,
        artifact: &DeploymentArtifact,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let url = destination.url.as_deref().ok_or_else(|| {
            DeploymentError::InvalidDestination(format!(
                "deployment '{}': url is required",
                destination.name
            ))
        })?;
        let target = FtpTarget::parse(url, destination.use_ssl)?;
        let files = artifact
            .files(destination.zip_artifact)
            .map_err(|e| DeploymentError::ArtifactMissing(e.to_string()))?;

        let credentials = Credentials {
            username: destination
                .username
                .clone()
                .unwrap_or_else(|| "anonymous".to_string()),
            password: destination
                .password
                .as_ref()
                .map(|p| p.expose_secret().as_str().to_string())
                .unwrap_or_else(|| "anonymous@".to_string()),
        };
        let timeout = self.timeout;

        tracing::debug!(
            host = %target.host,
            port = target.port,
            secure = target.secure,
            root = %target.root,
            files = files.len(),
            "Starting FTP upload"
        );

        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || upload(&target, &credentials, &files, timeout, &cancel))
            .await
            .map_err(|e| CourierError::Export(format!("FTP task failed: {e}")))?
    }
}

fn connect(
    target: &FtpTarget,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<NativeTlsFtpStream> {
    let failed = |message: String| -> CourierError {
        DeploymentError::ConnectionFailed(format!("{}:{}: {message}", target.host, target.port))
            .into()
    };

    let addr: SocketAddr = (target.host.as_str(), target.port)
        .to_socket_addrs()
        .map_err(|e| failed(e.to_string()))?
        .next()
        .ok_or_else(|| failed("host did not resolve".to_string()))?;

    let tls = || -> Result<NativeTlsConnector> {
        native_tls::TlsConnector::new()
            .map(NativeTlsConnector::from)
            .map_err(|e| failed(e.to_string()))
    };

    let mut ftp = if target.implicit_tls() {
        NativeTlsFtpStream::connect_secure_implicit(addr, tls()?, &target.host)
            .map_err(|e| failed(format!("implicit TLS connection failed: {e}")))?
    } else {
        NativeTlsFtpStream::connect_timeout(addr, timeout).map_err(|e| failed(e.to_string()))?
    };
    ftp.get_ref()
        .set_read_timeout(Some(timeout))
        .map_err(|e| failed(e.to_string()))?;
    ftp.get_ref()
        .set_write_timeout(Some(timeout))
        .map_err(|e| failed(e.to_string()))?;

    if target.secure && !target.implicit_tls() {
        ftp = ftp
            .into_secure(tls()?, &target.host)
            .map_err(|e| failed(format!("TLS negotiation failed: {e}")))?;
    }

    ftp.login(credentials.username.as_str(), credentials.password.as_str())
        .map_err(|e| failed(format!("login failed: {e}")))?;
    ftp.transfer_type(FileType::Binary)
        .map_err(|e| failed(e.to_string()))?;

    Ok(ftp)
}

/// Whether the control connection is still usable after `error`
///
/// Only a proper 4xx/5xx reply leaves the session in a known state; I/O
/// failures and unparsable or out-of-sequence replies do not.
fn session_intact(error: &FtpError) -> bool {
    match error {
        FtpError::UnexpectedResponse(response) => (400..600).contains(&response.status.code()),
        _ => false,
    }
}

fn upload(
    target: &FtpTarget,
    credentials: &Credentials,
    files: &[ArtifactFile],
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<usize> {
    if cancel.is_cancelled() {
        return Err(CourierError::Cancelled);
    }
    let mut ftp = connect(target, credentials, timeout)?;
    let outcome = upload_files(&mut ftp, target, files, cancel);

    if let Err(e) = ftp.quit() {
        tracing::debug!(error = %e, "FTP quit failed");
    }
    outcome
}

fn upload_files(
    ftp: &mut NativeTlsFtpStream,
    target: &FtpTarget,
    files: &[ArtifactFile],
    cancel: &CancellationToken,
) -> Result<usize> {
    let lost = |uploaded: usize, remote: &str, e: FtpError| -> CourierError {
        DeploymentError::ConnectionFailed(format!(
            "{}:{}: connection lost at {remote} after {uploaded} of {} file(s): {e}",
            target.host,
            target.port,
            files.len()
        ))
        .into()
    };

    let mut created: HashSet<String> = HashSet::new();
    let mut uploaded = 0;
    let mut failures = Vec::new();

    for file in files {
        if cancel.is_cancelled() {
            tracing::info!(uploaded, total = files.len(), "FTP upload cancelled");
            return Err(CourierError::Cancelled);
        }

        let remote = target.remote_path(&file.relative_path);

        for dir in parent_dirs(&remote) {
            if created.insert(dir.clone()) {
                match ftp.mkdir(&dir) {
                    Ok(()) => {}
                    // Refused when the directory already exists
                    Err(e) if session_intact(&e) => {
                        tracing::trace!(dir = %dir, error = %e, "mkdir skipped");
                    }
                    Err(e) => return Err(lost(uploaded, &dir, e)),
                }
            }
        }

        let source = match File::open(&file.path) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(remote = %remote, error = %e, "Cannot read artifact file");
                failures.push(format!("{remote}: {e}"));
                continue;
            }
        };
        match ftp.put_file(&remote, &mut BufReader::new(source)) {
            Ok(bytes) => {
                uploaded += 1;
                tracing::debug!(remote = %remote, bytes, "Uploaded file");
            }
            Err(e) if session_intact(&e) => {
                tracing::warn!(remote = %remote, error = %e, "FTP upload failed");
                failures.push(format!("{remote}: {e}"));
            }
            Err(e) => return Err(lost(uploaded, &remote, e)),
        }
    }

    if failures.is_empty() {
        Ok(uploaded)
    } else {
        Err(DeploymentError::PartialUpload {
            uploaded,
            total: files.len(),
            message: failures.join("; "),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeploymentKind;
    use std::io::{BufRead, Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;
    use tempfile::TempDir;
    use test_case::test_case;

    /// How the in-process server deviates from a well-behaved one
    #[derive(Default)]
    struct Script {
        /// Answer STOR of this path with 550
        reject: Option<&'static str>,
        /// Drop the control connection after this many stored files
        hang_up_after: Option<usize>,
        /// Fired once the first file is stored
        cancel_on_store: Option<CancellationToken>,
    }

    #[derive(Default)]
    struct Session {
        commands: Vec<String>,
        stored: Vec<(String, Vec<u8>)>,
    }

    /// Minimal passive-mode FTP server on a loopback port
    fn serve(script: Script) -> (u16, JoinHandle<Session>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = std::thread::spawn(move || {
            let mut session = Session::default();
            let (control, _) = listener.accept().unwrap();
            let mut reader = std::io::BufReader::new(control.try_clone().unwrap());
            let mut writer = control;
            let mut data: Option<TcpListener> = None;
            writer.write_all(b"220 ready\r\n").unwrap();

            let mut line = String::new();
            loop {
                line.clear();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    break;
                }
                let command = line.trim_end().to_string();
                session.commands.push(command.clone());
                let (verb, arg) = command.split_once(' ').unwrap_or((command.as_str(), ""));

                let mut close = false;
                let reply = match verb {
                    "USER" => "331 password required".to_string(),
                    "PASS" => "230 logged in".to_string(),
                    "TYPE" => "200 type set".to_string(),
                    "MKD" => format!("257 \"{arg}\" created"),
                    "PASV" => {
                        let passive = TcpListener::bind("127.0.0.1:0").unwrap();
                        let data_port = passive.local_addr().unwrap().port();
                        data = Some(passive);
                        format!(
                            "227 Entering Passive Mode (127,0,0,1,{},{})",
                            data_port / 256,
                            data_port % 256
                        )
                    }
                    "STOR" => {
                        let (mut stream, _) = data.take().unwrap().accept().unwrap();
                        if script.reject == Some(arg) {
                            "550 permission denied".to_string()
                        } else {
                            writer.write_all(b"150 opening data connection\r\n").unwrap();
                            let mut content = Vec::new();
                            stream.read_to_end(&mut content).unwrap();
                            session.stored.push((arg.to_string(), content));
                            if let Some(token) = &script.cancel_on_store {
                                token.cancel();
                            }
                            close = script.hang_up_after == Some(session.stored.len());
                            "226 transfer complete".to_string()
                        }
                    }
                    "QUIT" => {
                        close = true;
                        "221 bye".to_string()
                    }
                    _ => "502 not implemented".to_string(),
                };
                writer.write_all(format!("{reply}\r\n").as_bytes()).unwrap();
                if close {
                    break;
                }
            }
            session
        });

        (port, handle)
    }

    fn tree_artifact(dir: &TempDir) -> DeploymentArtifact {
        let out = dir.path().join("out");
        std::fs::create_dir_all(out.join("media")).unwrap();
        std::fs::write(out.join("feed.jsonl"), "{\"id\":1}\n").unwrap();
        std::fs::write(out.join("media").join("logo.txt"), "logo").unwrap();
        DeploymentArtifact::new("feed", out)
    }

    fn destination(port: u16, root: &str) -> DeploymentConfig {
        let mut destination = DeploymentConfig::new("partner-ftp", DeploymentKind::Ftp);
        destination.url = Some(format!("ftp://127.0.0.1:{port}{root}"));
        destination.username = Some("feeds".to_string());
        destination
    }

    #[tokio::test]
    async fn test_uploads_directory_tree() {
        let dir = TempDir::new().unwrap();
        let artifact = tree_artifact(&dir);
        let (port, server) = serve(Script::default());

        let uploaded = FtpPublisher::new(5)
            .publish(&destination(port, "/incoming"), &artifact, &CancellationToken::new())
            .await
            .unwrap();
        let session = server.join().unwrap();

        assert_eq!(uploaded, 2);
        assert_eq!(
            session.stored,
            vec![
                ("/incoming/feed.jsonl".to_string(), b"{\"id\":1}\n".to_vec()),
                ("/incoming/media/logo.txt".to_string(), b"logo".to_vec()),
            ]
        );
        let mkdirs: Vec<_> = session
            .commands
            .iter()
            .filter(|c| c.starts_with("MKD"))
            .collect();
        assert_eq!(mkdirs, vec!["MKD /incoming", "MKD /incoming/media"]);
        assert!(session.commands.contains(&"USER feeds".to_string()));
        assert!(session.commands.contains(&"TYPE I".to_string()));
        assert_eq!(session.commands.last().map(String::as_str), Some("QUIT"));
    }

    #[tokio::test]
    async fn test_uploads_single_zip_to_root() {
        let dir = TempDir::new().unwrap();
        let zip = dir.path().join("feed.zip");
        std::fs::write(&zip, b"PK\x03\x04").unwrap();
        let artifact = tree_artifact(&dir).with_zip(&zip);
        let (port, server) = serve(Script::default());

        let mut destination = destination(port, "");
        destination.zip_artifact = true;
        let uploaded = FtpPublisher::new(5)
            .publish(&destination, &artifact, &CancellationToken::new())
            .await
            .unwrap();
        let session = server.join().unwrap();

        assert_eq!(uploaded, 1);
        assert_eq!(
            session.stored,
            vec![("/feed.zip".to_string(), b"PK\x03\x04".to_vec())]
        );
        assert!(!session.commands.iter().any(|c| c.starts_with("MKD")));
    }

    #[tokio::test]
    async fn test_refused_file_is_partial_upload() {
        let dir = TempDir::new().unwrap();
        let artifact = tree_artifact(&dir);
        let (port, server) = serve(Script {
            reject: Some("/incoming/feed.jsonl"),
            ..Script::default()
        });

        let err = FtpPublisher::new(5)
            .publish(&destination(port, "/incoming"), &artifact, &CancellationToken::new())
            .await
            .unwrap_err();
        let session = server.join().unwrap();

        assert!(matches!(
            err,
            CourierError::Deployment(DeploymentError::PartialUpload {
                uploaded: 1,
                total: 2,
                ..
            })
        ));
        assert_eq!(session.stored.len(), 1);
        assert_eq!(session.stored[0].0, "/incoming/media/logo.txt");
    }

    #[tokio::test]
    async fn test_dropped_connection_stops_the_walk() {
        let dir = TempDir::new().unwrap();
        let artifact = tree_artifact(&dir);
        let (port, server) = serve(Script {
            hang_up_after: Some(1),
            ..Script::default()
        });

        let err = FtpPublisher::new(5)
            .publish(&destination(port, "/incoming"), &artifact, &CancellationToken::new())
            .await
            .unwrap_err();
        let session = server.join().unwrap();

        assert!(
            matches!(
                err,
                CourierError::Deployment(DeploymentError::ConnectionFailed(ref message))
                    if message.contains("after 1 of 2")
            ),
            "unexpected error: {err}"
        );
        assert_eq!(session.stored.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_before_next_file() {
        let dir = TempDir::new().unwrap();
        let artifact = tree_artifact(&dir);
        let cancel = CancellationToken::new();
        let (port, server) = serve(Script {
            cancel_on_store: Some(cancel.clone()),
            ..Script::default()
        });

        let err = FtpPublisher::new(5)
            .publish(&destination(port, "/incoming"), &artifact, &cancel)
            .await
            .unwrap_err();
        let session = server.join().unwrap();

        assert!(matches!(err, CourierError::Cancelled));
        assert_eq!(session.stored.len(), 1);
        assert_eq!(session.commands.last().map(String::as_str), Some("QUIT"));
    }

    #[test_case("ftp://files.example.com/incoming", false, 21, false, "/incoming" ; "plain")]
    #[test_case("ftp://files.example.com/incoming/", true, 990, true, "/incoming" ; "use_ssl upgrades")]
    #[test_case("ftps://files.example.com", false, 990, true, "/" ; "ftps scheme")]
    #[test_case("ftps://files.example.com:2121/a/b", false, 2121, true, "/a/b" ; "explicit port wins")]
    #[test_case("files.example.com/feeds", false, 21, false, "/feeds" ; "bare host")]
    fn test_parse_target(url: &str, use_ssl: bool, port: u16, secure: bool, root: &str) {
        let target = FtpTarget::parse(url, use_ssl).unwrap();
        assert_eq!(target.host, "files.example.com");
        assert_eq!(target.port, port);
        assert_eq!(target.secure, secure);
        assert_eq!(target.root, root);
    }

    #[test_case("ftps://files.example.com", true ; "default secure port is implicit")]
    #[test_case("ftps://files.example.com:990", true ; "port 990 is implicit")]
    #[test_case("ftps://files.example.com:21", false ; "port 21 upgrades with auth tls")]
    #[test_case("ftp://files.example.com:990", false ; "plain never uses tls")]
    fn test_implicit_tls(url: &str, implicit: bool) {
        assert_eq!(FtpTarget::parse(url, false).unwrap().implicit_tls(), implicit);
    }

    #[test_case("http://files.example.com/" ; "wrong scheme")]
    #[test_case("ftp://" ; "no host")]
    fn test_parse_target_rejects(url: &str) {
        assert!(FtpTarget::parse(url, false).is_err());
    }

    #[test]
    fn test_remote_paths_and_parents() {
        let target = FtpTarget::parse("ftp://h/incoming", false).unwrap();
        let remote = target.remote_path("media/logo.txt");
        assert_eq!(remote, "/incoming/media/logo.txt");
        assert_eq!(parent_dirs(&remote), vec!["/incoming", "/incoming/media"]);

        let root = FtpTarget::parse("ftp://h", false).unwrap();
        assert_eq!(root.remote_path("feed.zip"), "/feed.zip");
        assert!(parent_dirs("/feed.zip").is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_failure() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("feed.jsonl"), "{}\n").unwrap();
        let artifact = DeploymentArtifact::new("feed", dir.path());

        let mut destination = DeploymentConfig::new("ftp", DeploymentKind::Ftp);
        destination.url = Some("ftp://127.0.0.1:1/incoming".to_string());

        let err = FtpPublisher::new(1)
            .publish(&destination, &artifact, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CourierError::Deployment(DeploymentError::ConnectionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_url_is_invalid() {
        let artifact = DeploymentArtifact::new("feed", "/tmp");
        let destination = DeploymentConfig::new("ftp", DeploymentKind::Ftp);
        let err = FtpPublisher::new(1)
            .publish(&destination, &artifact, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("url is required"));
    }
}
