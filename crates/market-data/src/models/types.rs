use std::borrow::Cow;

/// Provider identifier - mostly static constants ("YAHOO", "MONEYCONTROL")
pub type ProviderId = Cow<'static, str>;
