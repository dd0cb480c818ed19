//! Back-office routes. Every handler takes [`AdminUser`](crate::auth::AdminUser).

mod categories;
mod coupons;
mod dashboard;
mod orders;
mod products;

use axum::Router;
use validator::Validate;

use crate::db::Translation;
use crate::error::{AppError, AppResult};
use crate::locale::Locale;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    let admin = Router::new()
        .merge(products::router())
        .merge(categories::router())
        .merge(coupons::router())
        .merge(orders::router())
        .merge(dashboard::router());
    Router::new().nest("/admin", admin)
}

/// Validates every translation and returns the one in the store's default
/// locale, which reads fall back to.
fn default_translation(translations: &[Translation], default: Locale) -> AppResult<&Translation> {
    for t in translations {
        t.validate()?;
    }
    if let Some(dup) = Locale::ALL.iter().find(|l| translations.iter().filter(|t| t.locale == **l).count() > 1) {
        return Err(AppError::validation(format!("Duplicate translation for locale {dup}")));
    }
    translations
        .iter()
        .find(|t| t.locale == default)
        .ok_or_else(|| AppError::validation(format!("A translation in the default locale ({default}) is required")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(locale: Locale, name: &str) -> Translation {
        Translation { locale, name: name.into(), description: None }
    }

    #[test]
    fn test_default_translation_required() {
        let err = default_translation(&[t(Locale::Ar, "قميص")], Locale::En).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let list = [t(Locale::Ar, "قميص"), t(Locale::En, "Shirt")];
        assert_eq!(default_translation(&list, Locale::En).unwrap().name, "Shirt");
    }

    #[test]
    fn test_duplicate_and_blank_translations_rejected() {
        assert!(default_translation(&[t(Locale::En, "A"), t(Locale::En, "B")], Locale::En).is_err());
        assert!(default_translation(&[t(Locale::En, "")], Locale::En).is_err());
    }
}
