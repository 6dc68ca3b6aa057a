use crate::error::Result;

/// One epoch's worth of fallible batches.
pub type Batches<'a, B> = Box<dyn Iterator<Item = Result<B>> + 'a>;

/// A re-iterable source of batches; every call to `batches` starts a new pass.
pub trait Loader<B> {
    fn batches(&mut self) -> Result<Batches<'_, B>>;
}

/// Serves a fixed list of batches in order, once per pass.
#[derive(Debug, Clone)]
pub struct InMemoryLoader<B> {
    batches: Vec<B>,
}

impl<B> InMemoryLoader<B> {
    pub fn new(batches: Vec<B>) -> Self {
        InMemoryLoader { batches }
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

impl<B: Clone + 'static> Loader<B> for InMemoryLoader<B> {
    fn batches(&mut self) -> Result<Batches<'_, B>> {
        Ok(Box::new(self.batches.iter().cloned().map(Ok)))
    }
}
