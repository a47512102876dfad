use std::path::PathBuf;

/// A parse or I/O error together with the file it came from.
#[derive(Debug, thiserror::Error)]
#[error("{}: {source}", path.display())]
pub struct FileError<E>
where
    E: std::error::Error + 'static,
{
    pub path: PathBuf,
    #[source]
    pub source: E,
}

impl<E> FileError<E>
where
    E: std::error::Error + 'static,
{
    pub(crate) fn new(path: impl Into<PathBuf>) -> impl FnOnce(E) -> Self {
        let path = path.into();
        move |source| Self { path, source }
    }
}
