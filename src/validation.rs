use thiserror::Error;

pub const MIN_BATCH_CHUNK_SIZE: i64 = 50;
pub const MAX_BATCH_CHUNK_SIZE: i64 = 2000;
pub const MAX_BATCH_OVERLAP: i64 = 200;

/// Form field a validation failure points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Strategy,
    ChunkSize,
    Overlap,
    Dataset,
}

impl Field {
    /// Element id of the field on the rendered pages.
    pub fn element_id(self) -> &'static str {
        match self {
            Self::Strategy => "chunkStrategy",
            Self::ChunkSize => "chunkSize",
            Self::Overlap => "overlap",
            Self::Dataset => "difyKnowledgeBase",
        }
    }
}

/// Display text is shown to the user as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("请选择切块策略")]
    MissingStrategy,
    #[error("请输入有效的切块大小(50-2000)")]
    ChunkSizeOutOfRange,
    #[error("切块大小必须大于0")]
    ChunkSizeNotPositive,
    #[error("请输入有效的重叠度(0-200)")]
    OverlapOutOfRange,
    #[error("重叠度必须大于等于0且小于切块大小")]
    OverlapNotBelowSize,
    #[error("请选择知识库")]
    MissingDataset,
}

impl ValidationError {
    pub fn field(self) -> Field {
        match self {
            Self::MissingStrategy => Field::Strategy,
            Self::ChunkSizeOutOfRange | Self::ChunkSizeNotPositive => Field::ChunkSize,
            Self::OverlapOutOfRange | Self::OverlapNotBelowSize => Field::Overlap,
            Self::MissingDataset => Field::Dataset,
        }
    }
}

/// Validated chunking parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkParams {
    pub strategy: String,
    pub chunk_size: i64,
    pub overlap: i64,
}

/// Chunking parameters as typed into the form, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkForm {
    pub strategy: String,
    pub chunk_size: String,
    pub overlap: String,
}

impl ChunkForm {
    pub fn new(
        strategy: impl Into<String>,
        chunk_size: impl Into<String>,
        overlap: impl Into<String>,
    ) -> Self {
        Self {
            strategy: strategy.into(),
            chunk_size: chunk_size.into(),
            overlap: overlap.into(),
        }
    }

    /// Rules for folder-level batch chunking: size in [50, 2000], overlap in
    /// [0, 200] and strictly below the size.
    pub fn validate_batch(&self) -> Result<ChunkParams, ValidationError> {
        let strategy = self.strategy.trim();
        if strategy.is_empty() {
            return Err(ValidationError::MissingStrategy);
        }

        let chunk_size = parse_int(&self.chunk_size)
            .filter(|size| (MIN_BATCH_CHUNK_SIZE..=MAX_BATCH_CHUNK_SIZE).contains(size))
            .ok_or(ValidationError::ChunkSizeOutOfRange)?;
        let overlap = parse_int(&self.overlap)
            .filter(|overlap| (0..=MAX_BATCH_OVERLAP).contains(overlap))
            .ok_or(ValidationError::OverlapOutOfRange)?;
        if overlap >= chunk_size {
            return Err(ValidationError::OverlapNotBelowSize);
        }

        Ok(ChunkParams {
            strategy: strategy.to_string(),
            chunk_size,
            overlap,
        })
    }

    /// Rules for the single document form: positive size, overlap in
    /// [0, size).
    pub fn validate_document(&self) -> Result<ChunkParams, ValidationError> {
        let strategy = self.strategy.trim();
        if strategy.is_empty() {
            return Err(ValidationError::MissingStrategy);
        }

        let chunk_size = parse_int(&self.chunk_size).unwrap_or(0);
        if chunk_size <= 0 {
            return Err(ValidationError::ChunkSizeNotPositive);
        }
        let overlap = parse_int(&self.overlap).unwrap_or(0);
        if overlap < 0 || overlap >= chunk_size {
            return Err(ValidationError::OverlapNotBelowSize);
        }

        Ok(ChunkParams {
            strategy: strategy.to_string(),
            chunk_size,
            overlap,
        })
    }

    /// Per-field flags for live feedback while typing in the single
    /// document form. The overlap flag is only decided once the size is
    /// usable.
    pub fn live_check(&self) -> LiveCheck {
        let chunk_size = parse_int(&self.chunk_size).unwrap_or(0);
        let overlap = parse_int(&self.overlap).unwrap_or(0);
        LiveCheck {
            chunk_size_invalid: chunk_size <= 0,
            overlap_invalid: (chunk_size > 0).then_some(overlap < 0 || overlap >= chunk_size),
        }
    }
}

impl From<&ChunkParams> for ChunkForm {
    fn from(params: &ChunkParams) -> Self {
        Self::new(
            params.strategy.clone(),
            params.chunk_size.to_string(),
            params.overlap.to_string(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveCheck {
    pub chunk_size_invalid: bool,
    pub overlap_invalid: Option<bool>,
}

pub fn validate_dataset(dataset_id: &str) -> Result<String, ValidationError> {
    let trimmed = dataset_id.trim();
    if trimmed.is_empty() {
        Err(ValidationError::MissingDataset)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Leading-integer parse of a form value: surrounding whitespace and
/// trailing garbage are ignored (`" 300px"` is 300), an empty or
/// non-numeric value is `None`.
pub fn parse_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value = digits[..end].parse::<i64>().ok()?;
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(size: &str, overlap: &str) -> Result<ChunkParams, ValidationError> {
        ChunkForm::new("word", size, overlap).validate_batch()
    }

    #[test]
    fn batch_rejects_chunk_size_below_minimum() {
        assert_eq!(batch("30", "10"), Err(ValidationError::ChunkSizeOutOfRange));
        assert_eq!(batch("2001", "10"), Err(ValidationError::ChunkSizeOutOfRange));
        assert_eq!(batch("", "10"), Err(ValidationError::ChunkSizeOutOfRange));
    }

    #[test]
    fn batch_rejects_overlap_above_maximum() {
        assert_eq!(batch("500", "250"), Err(ValidationError::OverlapOutOfRange));
        assert_eq!(batch("500", "-1"), Err(ValidationError::OverlapOutOfRange));
        assert_eq!(batch("500", ""), Err(ValidationError::OverlapOutOfRange));
    }

    #[test]
    fn batch_requires_overlap_below_size() {
        assert_eq!(batch("100", "100"), Err(ValidationError::OverlapNotBelowSize));
        assert_eq!(batch("50", "0").map(|p| (p.chunk_size, p.overlap)), Ok((50, 0)));
        assert_eq!(
            batch("2000", "200").map(|p| (p.chunk_size, p.overlap)),
            Ok((2000, 200))
        );
    }

    #[test]
    fn batch_requires_strategy() {
        let err = ChunkForm::new("  ", "300", "30").validate_batch();
        assert_eq!(err, Err(ValidationError::MissingStrategy));
        assert_eq!(ValidationError::MissingStrategy.field(), Field::Strategy);
    }

    #[test]
    fn document_flags_overlap_not_below_size() {
        let form = ChunkForm::new("word", "300", "300");
        let err = form.validate_document().unwrap_err();
        assert_eq!(err, ValidationError::OverlapNotBelowSize);
        assert_eq!(err.field(), Field::Overlap);
        assert_eq!(err.field().element_id(), "overlap");

        let err = ChunkForm::new("word", "0", "0").validate_document().unwrap_err();
        assert_eq!(err.field(), Field::ChunkSize);

        let ok = ChunkForm::new("word", "3000", "250").validate_document().unwrap();
        assert_eq!((ok.chunk_size, ok.overlap), (3000, 250));
    }

    #[test]
    fn live_check_skips_overlap_until_size_is_usable() {
        let check = ChunkForm::new("word", "", "20").live_check();
        assert!(check.chunk_size_invalid);
        assert_eq!(check.overlap_invalid, None);

        let check = ChunkForm::new("word", "100", "120").live_check();
        assert!(!check.chunk_size_invalid);
        assert_eq!(check.overlap_invalid, Some(true));
    }

    #[test]
    fn parse_int_reads_leading_digits() {
        assert_eq!(parse_int(" 300px"), Some(300));
        assert_eq!(parse_int("-12"), Some(-12));
        assert_eq!(parse_int("abc"), None);
        assert_eq!(parse_int("-"), None);
        assert_eq!(validate_dataset(" kb "), Ok("kb".to_string()));
        assert_eq!(validate_dataset(""), Err(ValidationError::MissingDataset));
    }
}
