use std::path::{Path, PathBuf};

use futures_util::{Stream, TryStreamExt};
use http::header::{AUTHORIZATION, LOCATION};
use octocrab::Octocrab;
use tokio::{fs, io::AsyncWriteExt};

use crate::error::DownloadError;

/// One transfer. Transient: exists only for the duration of the download.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub url: String,
    /// Bearer token, when the source requires authentication. Pre-signed
    /// redirect targets carry their own signature and need none.
    pub token: Option<String>,
    pub dest: PathBuf,
}

/// Stream `job.url` to `job.dest` without buffering the payload in memory.
/// Bytes land in a `.part` sibling that is renamed into place only on clean
/// completion; any failure removes the partial file, so an interrupted
/// transfer can never be mistaken for a whole one.
pub async fn download(http: &reqwest::Client, job: &DownloadJob) -> Result<(), DownloadError> {
    let mut request = http.get(&job.url);
    if let Some(token) = &job.token {
        request = request.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let response = request
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|source| DownloadError::Request { url: job.url.clone(), source })?;
    tracing::debug!("Downloading to {}", job.dest.display());
    write_stream(response.bytes_stream(), &job.dest).await
}

/// Variant for platform endpoints that answer with a short-lived signed
/// redirect rather than the bytes themselves (artifact zips, run logs).
/// The API hop uses the installation client; the binary hop streams from
/// the redirect target. The contract is the same as `download`.
pub async fn download_via_redirect(
    client: &Octocrab,
    http: &reqwest::Client,
    route: &str,
    dest: PathBuf,
) -> Result<(), DownloadError> {
    let url = fetch_redirect_location(client, route).await?;
    download(http, &DownloadJob { url, token: None, dest }).await
}

async fn fetch_redirect_location(
    client: &Octocrab,
    route: &str,
) -> Result<String, DownloadError> {
    let response = client
        ._get(route)
        .await
        .map_err(|source| DownloadError::Api { route: route.to_string(), source })?;
    let status = response.status();
    if !status.is_redirection() {
        return Err(DownloadError::NoRedirect {
            route: route.to_string(),
            status: status.as_u16(),
        });
    }
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| DownloadError::NoRedirect { route: route.to_string(), status: status.as_u16() })
}

async fn write_stream<S, E>(mut stream: S, dest: &Path) -> Result<(), DownloadError>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    let part = partial_path(dest);
    match write_part(&mut stream, &part).await {
        Ok(()) => match fs::rename(&part, dest).await {
            Ok(()) => Ok(()),
            Err(source) => {
                remove_partial(&part).await;
                Err(DownloadError::Io { path: dest.to_path_buf(), source })
            }
        },
        Err(e) => {
            remove_partial(&part).await;
            Err(e)
        }
    }
}

async fn write_part<S, E>(stream: &mut S, part: &Path) -> Result<(), DownloadError>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    let io_err = |source| DownloadError::Io { path: part.to_path_buf(), source };
    let mut file = fs::File::create(part).await.map_err(io_err)?;
    loop {
        let chunk = stream.try_next().await.map_err(|source| DownloadError::Transfer {
            path: part.to_path_buf(),
            source: Box::new(source),
        })?;
        let Some(chunk) = chunk else { break };
        file.write_all(&chunk).await.map_err(io_err)?;
    }
    file.flush().await.map_err(io_err)?;
    Ok(())
}

async fn remove_partial(part: &Path) {
    if let Err(e) = fs::remove_file(part).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!("Failed to remove partial file {}: {}", part.display(), e);
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}
