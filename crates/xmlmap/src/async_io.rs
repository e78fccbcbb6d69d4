//! Async variants of the facade calls.
//!
//! Each call takes a [`CancellationToken`]. The token is checked before the
//! document is transformed and raced against any async I/O; the in-memory
//! transform itself is never interrupted halfway.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::document::{AnyDocument, Document, DocumentType};
use crate::error::{Error, Result};
use crate::facade::Serializer;

fn ensure_active(cancel: &CancellationToken, document: &DocumentType) -> Result<()> {
    if cancel.is_cancelled() {
        tracing::debug!(document = document.name(), "cancelled before start");
        return Err(cancelled(document));
    }
    Ok(())
}

async fn write_and_flush<W>(out: &mut W, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    out.write_all(bytes).await?;
    out.flush().await
}

fn cancelled(document: &DocumentType) -> Error {
    Error::Cancelled {
        type_name: document.name().to_string(),
    }
}

impl Serializer {
    /// Serializes `document` to an XML string unless `cancel` has fired.
    pub async fn serialize_async<T: Document>(
        &self,
        document: &T,
        cancel: &CancellationToken,
    ) -> Result<String> {
        ensure_active(cancel, &DocumentType::of::<T>())?;
        self.serialize_to_string(document)
    }

    /// Writes `document` to an async sink and flushes it.
    pub async fn serialize_to_async_writer<T, W>(
        &self,
        document: &T,
        out: &mut W,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        T: Document,
        W: AsyncWrite + Unpin + ?Sized,
    {
        let doc_type = DocumentType::of::<T>();
        ensure_active(cancel, &doc_type)?;
        let bytes = self.serialize_to_vec(document)?;

        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(&doc_type)),
            res = write_and_flush(out, &bytes) => res,
        };
        written.map_err(|source| Error::Write {
            type_name: doc_type.name().to_string(),
            source,
        })
    }

    /// Reads a document of type `document` from XML text unless `cancel` has
    /// fired.
    pub async fn deserialize_async(
        &self,
        xml: &str,
        document: &DocumentType,
        cancel: &CancellationToken,
    ) -> Result<AnyDocument> {
        ensure_active(cancel, document)?;
        self.deserialize_from_str(xml, document)
    }

    /// Reads a document of type `document` from an async source, starting at
    /// its current position.
    pub async fn deserialize_from_async_reader<R>(
        &self,
        reader: &mut R,
        document: &DocumentType,
        cancel: &CancellationToken,
    ) -> Result<AnyDocument>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let bytes = self.read_all(reader, document, cancel).await?;
        self.deserialize_from_slice(&bytes, document)
    }

    /// Reads a `T` from XML text unless `cancel` has fired.
    pub async fn from_str_async<T: Document>(
        &self,
        xml: &str,
        cancel: &CancellationToken,
    ) -> Result<T> {
        ensure_active(cancel, &DocumentType::of::<T>())?;
        self.from_str(xml)
    }

    /// Reads a `T` from an async source, starting at its current position.
    pub async fn from_async_reader<T, R>(
        &self,
        reader: &mut R,
        cancel: &CancellationToken,
    ) -> Result<T>
    where
        T: Document,
        R: AsyncRead + Unpin + ?Sized,
    {
        let doc_type = DocumentType::of::<T>();
        let bytes = self.read_all(reader, &doc_type, cancel).await?;
        self.from_slice(&bytes)
    }

    async fn read_all<R>(
        &self,
        reader: &mut R,
        document: &DocumentType,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        ensure_active(cancel, document)?;
        // Fail on unregistered types before touching the source
        self.compiled(document)?;

        let mut bytes = Vec::new();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(cancelled(document)),
            res = reader.read_to_end(&mut bytes) => {
                res?;
                Ok(bytes)
            }
        }
    }
}
