// THEORY:
// Pre-rendered HTML documents read from disk. The file is re-read on every
// refresh, so whatever job writes the template only has to replace the file.

use std::path::PathBuf;

use futures::FutureExt;
use futures::future::BoxFuture;
use home_dashboard::{RenderError, RenderOutput, Renderer};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct HtmlFile {
    path: PathBuf,
}

impl HtmlFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Renderer for HtmlFile {
    fn render<'a>(
        &'a self,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<RenderOutput, RenderError>> {
        async move {
            let html = tokio::fs::read_to_string(&self.path).await?;
            Ok(RenderOutput::Html(html))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_the_document_as_html() {
        let path = std::env::temp_dir().join(format!("hd-html-{}.html", std::process::id()));
        tokio::fs::write(&path, "<h1>07:42 bus</h1>").await.expect("write fixture");

        let output = HtmlFile::new(&path)
            .render(&CancellationToken::new())
            .await
            .expect("render");
        let _ = tokio::fs::remove_file(&path).await;

        match output {
            RenderOutput::Html(html) => assert_eq!(html, "<h1>07:42 bus</h1>"),
            RenderOutput::Image(_) => panic!("expected html"),
        }
    }

    #[tokio::test]
    async fn a_missing_file_is_an_io_error() {
        let result = HtmlFile::new("/no/such/template.html")
            .render(&CancellationToken::new())
            .await;
        assert!(matches!(result, Err(RenderError::Io(_))));
    }
}
