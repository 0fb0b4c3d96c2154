use crate::{
    extensions::Extension,
    fetch::FetchXml,
    parser::ast::OffsetFetch,
    translator::TranslationError,
    Error,
};

/// Largest `top` the platform accepts.
pub const MAX_NATIVE_TOP: i64 = 5000;

pub struct LimitResolver;

impl LimitResolver {
    /// TOP and OFFSET/FETCH go native unless an earlier local step can change which rows
    /// survive; then they are applied last, locally.
    pub fn apply(fetch: &mut FetchXml, top: Option<i64>, offset: Option<OffsetFetch>, extensions: &mut Vec<Extension>) -> Result<(), Error> {
        let row_changing = extensions.iter().any(Extension::changes_rows);

        if let Some(top) = top {
            let count = usize::try_from(top).map_err(|_| TranslationError::NotSupported(format!("TOP {}", top)))?;
            if !row_changing && top <= MAX_NATIVE_TOP {
                fetch.top = Some(top as u32);
            } else {
                extensions.push(Extension::ApplyLimit { offset: 0, count: Some(count) });
            }
        }

        if let Some(OffsetFetch { offset, fetch: size }) = offset {
            let skip = usize::try_from(offset).map_err(|_| TranslationError::NotSupported(format!("OFFSET {}", offset)))?;
            let count = match size {
                Some(n) => Some(usize::try_from(n).map_err(|_| TranslationError::NotSupported(format!("FETCH NEXT {}", n)))?),
                None => None,
            };
            match count {
                Some(n) if n > 0 && skip % n == 0 && !row_changing && n as i64 <= MAX_NATIVE_TOP => {
                    fetch.count = Some(n as u32);
                    fetch.page = Some((skip / n + 1) as u32);
                }
                _ => extensions.push(Extension::ApplyLimit { offset: skip, count }),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        extensions::Extension,
        fetch::FetchXml,
        parser::ast::{OffsetFetch, Predicate, Truth},
        translator::LimitResolver,
    };

    #[test]
    fn aligned_offset_becomes_a_page() {
        let mut fetch = FetchXml::new("account");
        let mut extensions = vec![];
        LimitResolver::apply(&mut fetch, None, Some(OffsetFetch { offset: 100, fetch: Some(50) }), &mut extensions).unwrap();
        assert_eq!((fetch.count, fetch.page), (Some(50), Some(3)));
        assert!(extensions.is_empty());
    }

    #[test]
    fn unaligned_offset_is_applied_locally() {
        let mut fetch = FetchXml::new("account");
        let mut extensions = vec![];
        LimitResolver::apply(&mut fetch, None, Some(OffsetFetch { offset: 10, fetch: Some(3) }), &mut extensions).unwrap();
        assert_eq!(fetch.page, None);
        assert_eq!(extensions, vec![Extension::ApplyLimit { offset: 10, count: Some(3) }]);
    }

    #[test]
    fn top_after_local_filter_is_local() {
        let mut fetch = FetchXml::new("account");
        let mut extensions = vec![Extension::FilterRows { predicate: Predicate::Const3(Truth::True) }];
        LimitResolver::apply(&mut fetch, Some(10), None, &mut extensions).unwrap();
        assert_eq!(fetch.top, None);
        assert_eq!(extensions.last(), Some(&Extension::ApplyLimit { offset: 0, count: Some(10) }));
    }
}
