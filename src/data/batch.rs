use crate::imaging::ImageBatch;

/// One training iteration's input.
#[derive(Debug, Clone)]
pub struct TrainBatch {
    pub scale: f64,
    pub low_res: ImageBatch,
    pub high_res: ImageBatch,
}

/// One evaluation iteration's input; `ids` holds one identifier per sample.
#[derive(Debug, Clone)]
pub struct EvalBatch {
    pub ids: Vec<String>,
    pub scale: f64,
    pub low_res: ImageBatch,
    pub high_res: ImageBatch,
}

impl TrainBatch {
    pub fn len(&self) -> usize {
        self.low_res.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EvalBatch {
    pub fn len(&self) -> usize {
        self.low_res.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
