//! # Utilidades de logging para errores
//!
//! Recorre la cadena `source()` de un error y la registra completa con
//! `tracing`. Lo usan los almacenes al fallar una escritura y [`AppError`]
//! al responder con un 500.
//!
//! [`AppError`]: super::AppError

use std::error::Error as StdError;

/// Mensajes de la cadena de errores, del más externo al causante
pub fn error_chain(error: &(dyn StdError + 'static)) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current: Option<&(dyn StdError + 'static)> = Some(error);

    while let Some(err) = current {
        chain.push(err.to_string());
        current = err.source();
    }
    chain
}

/// Registra la cadena completa de errores
///
/// # Parámetros
/// - `error`: Error a analizar y registrar
/// - `context`: Contexto opcional (operación en curso)
pub fn log_error_chain<E>(error: &E, context: Option<&str>)
where
    E: StdError + 'static,
{
    let chain = error_chain(error);

    match context {
        Some(ctx) => tracing::error!(
            context = %ctx,
            error_chain = ?chain,
            "Error with full chain (with context)"
        ),
        None => tracing::error!(error_chain = ?chain, "Error with full chain"),
    }
}

/// Extension trait para `Result` que registra la cadena de errores sin
/// consumir el error
///
/// ```ignore
/// collection
///     .delete_one(filter)
///     .await
///     .log_error_context("deleting reservation")?;
/// ```
pub trait ErrorLogExt<T, E> {
    fn log_error_context(self, context: &str) -> Result<T, E>;
}

impl<T, E> ErrorLogExt<T, E> for Result<T, E>
where
    E: StdError + 'static,
{
    fn log_error_context(self, context: &str) -> Result<T, E> {
        if let Err(ref error) = self {
            log_error_chain(error, Some(context));
        }
        self
    }
}
