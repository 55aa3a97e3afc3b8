//! Request body variants

use std::any::Any;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};

use crate::error::{HttpError, Result};

/// Stream of body chunks
pub type BodyStream = BoxStream<'static, io::Result<Bytes>>;

/// Lazily produces a [`BodyStream`] when the request is sent
pub type StreamFactory = Box<dyn FnOnce() -> BoxFuture<'static, io::Result<BodyStream>> + Send>;

/// Request body
#[derive(Default)]
pub enum Body {
    /// No payload
    #[default]
    Empty,
    /// In-memory bytes; `Content-Length` is derived from their length
    Bytes(Bytes),
    /// A stream piped to the connection as it is polled
    Stream(BodyStream),
    /// A stream created on demand right before the body is written
    Factory(StreamFactory),
    /// A file streamed from disk; `Content-Length` is the file size
    File(PathBuf),
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Body::Stream(_) => f.write_str("Stream"),
            Body::Factory(_) => f.write_str("Factory"),
            Body::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

impl Body {
    /// Body backed by a stream of chunks
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Body::Stream(stream.boxed())
    }

    /// Body whose stream is produced by `factory` when the request is sent
    pub fn factory<F, Fut, S>(factory: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = io::Result<S>> + Send + 'static,
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Body::Factory(Box::new(move || {
            factory().map(|result| result.map(StreamExt::boxed)).boxed()
        }))
    }

    /// Body streamed from the file at `path`
    pub fn file(path: impl AsRef<Path>) -> Self {
        Body::File(path.as_ref().to_path_buf())
    }

    /// Whether the body carries no payload
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// Convert a dynamically typed value into a body
    ///
    /// Accepts `Body`, `Bytes`, `Vec<u8>`, `String`, `&'static str`,
    /// `&'static [u8]`, [`BodyStream`], [`StreamFactory`] and `PathBuf`
    /// (a file reference). `()` maps to [`Body::Empty`]. Anything else is an
    /// argument error.
    pub fn from_dynamic(value: Box<dyn Any + Send>) -> Result<Body> {
        let value = match value.downcast::<Body>() {
            Ok(body) => return Ok(*body),
            Err(value) => value,
        };
        let value = match value.downcast::<Bytes>() {
            Ok(bytes) => return Ok(Body::Bytes(*bytes)),
            Err(value) => value,
        };
        let value = match value.downcast::<Vec<u8>>() {
            Ok(bytes) => return Ok(Body::from(*bytes)),
            Err(value) => value,
        };
        let value = match value.downcast::<String>() {
            Ok(text) => return Ok(Body::from(*text)),
            Err(value) => value,
        };
        let value = match value.downcast::<&'static str>() {
            Ok(text) => return Ok(Body::from(*text)),
            Err(value) => value,
        };
        let value = match value.downcast::<&'static [u8]>() {
            Ok(bytes) => return Ok(Body::from(*bytes)),
            Err(value) => value,
        };
        let value = match value.downcast::<BodyStream>() {
            Ok(stream) => return Ok(Body::Stream(*stream)),
            Err(value) => value,
        };
        let value = match value.downcast::<StreamFactory>() {
            Ok(factory) => return Ok(Body::Factory(*factory)),
            Err(value) => value,
        };
        let value = match value.downcast::<PathBuf>() {
            Ok(path) => return Ok(Body::File(*path)),
            Err(value) => value,
        };
        if value.is::<()>() {
            return Ok(Body::Empty);
        }
        Err(HttpError::Argument("Unknown request body".to_string()))
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Bytes(Bytes::from(text))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Body::Bytes(Bytes::from_static(text.as_bytes()))
    }
}

impl From<&'static [u8]> for Body {
    fn from(bytes: &'static [u8]) -> Self {
        Body::Bytes(Bytes::from_static(bytes))
    }
}

impl From<Option<Body>> for Body {
    fn from(body: Option<Body>) -> Self {
        body.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        assert!(Body::default().is_empty());
        assert!(Body::from(None).is_empty());
    }

    #[test]
    fn test_dynamic_bytes_variants() {
        let body = Body::from_dynamic(Box::new(vec![1u8, 2, 3])).expect("Vec<u8> is a body");
        assert!(matches!(body, Body::Bytes(ref b) if b.as_ref() == [1, 2, 3]));

        let body = Body::from_dynamic(Box::new("hello")).expect("&str is a body");
        assert!(matches!(body, Body::Bytes(ref b) if b.as_ref() == b"hello"));

        let body = Body::from_dynamic(Box::new(String::from("hi"))).expect("String is a body");
        assert!(matches!(body, Body::Bytes(ref b) if b.as_ref() == b"hi"));
    }

    #[test]
    fn test_dynamic_file_and_unit() {
        let body = Body::from_dynamic(Box::new(PathBuf::from("/tmp/upload.bin")))
            .expect("PathBuf is a file body");
        assert!(matches!(body, Body::File(ref p) if p == Path::new("/tmp/upload.bin")));

        let body = Body::from_dynamic(Box::new(())).expect("Unit is an empty body");
        assert!(body.is_empty());
    }

    #[test]
    fn test_dynamic_stream() {
        let stream: BodyStream = futures::stream::iter(vec![Ok(Bytes::from_static(b"x"))]).boxed();
        let body = Body::from_dynamic(Box::new(stream)).expect("BodyStream is a body");
        assert!(matches!(body, Body::Stream(_)));
    }

    #[test]
    fn test_dynamic_unknown_type_is_argument_error() {
        let result = Body::from_dynamic(Box::new(42i32));
        match result {
            Err(HttpError::Argument(msg)) => assert_eq!(msg, "Unknown request body"),
            other => panic!("Expected HttpError::Argument, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_factory_runs_lazily() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        let body = Body::factory(move || async move {
            flag.store(true, Ordering::SeqCst);
            Ok(futures::stream::iter(vec![Ok(Bytes::from_static(b"lazy"))]))
        });
        assert!(!called.load(Ordering::SeqCst));

        let Body::Factory(factory) = body else {
            panic!("Expected Body::Factory");
        };
        let stream = factory().await.expect("Factory should succeed");
        assert!(called.load(Ordering::SeqCst));

        let chunks: Vec<_> = stream.collect().await;
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_debug_hides_payload() {
        let body = Body::from(vec![0u8; 16]);
        assert_eq!(format!("{:?}", body), "Bytes(16)");
    }
}
