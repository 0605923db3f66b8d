/// Wildcard match, `?` takes one unit and `*` any run, units are compared after `fold`
pub(crate) fn matches(pattern: &[u16], name: &[u16], fold: &dyn Fn(u16) -> u16) -> bool {
    const ANY: u16 = b'?' as u16;
    const STAR: u16 = b'*' as u16;
    match pattern.split_first() {
        None => name.is_empty(),
        Some((&STAR, rest)) => (0..=name.len()).any(|skip| matches(rest, &name[skip..], fold)),
        Some((&unit, rest)) => match name.split_first() {
            Some((&first, tail)) if unit == ANY || fold(unit) == fold(first) => {
                matches(rest, tail, fold)
            }
            _ => false,
        },
    }
}
