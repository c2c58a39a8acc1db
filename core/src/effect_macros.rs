//! Declarative macros for ergonomic effect construction
//!
//! Reducers mostly produce a single async effect that calls a repository and
//! maps the result into a settlement action. These macros keep that short.

/// Create an `Effect::Future` from an async block
///
/// # Example
///
/// ```rust,ignore
/// use shopkeep_core::async_effect;
///
/// async_effect! {
///     let products = repository.list().await.ok()?;
///     Some(ProductAction::ProductsLoaded { products, request_id })
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

/// Create an `Effect::Future` that settles a repository call
///
/// `call` is evaluated right away, outside the effect, so it may borrow from
/// the environment as long as the future it returns is `'static`. The future
/// is awaited once; `Ok` values go through `on_success`, errors through
/// `on_error`. Both arms must produce the store's action type.
///
/// # Example
///
/// ```rust,ignore
/// use shopkeep_core::settle;
///
/// settle! {
///     call: repository.delete(&id),
///     on_success: |()| CartAction::ItemRemoved { id: removed, request_id },
///     on_error: |error| CartAction::Failed {
///         request: "cart/DecrementOrRemove",
///         request_id,
///         error: error.to_string(),
///     }
/// }
/// ```
#[macro_export]
macro_rules! settle {
    (
        call: $call:expr,
        on_success: |$ok:pat_param| $success_body:expr,
        on_error: |$err:ident| $error_body:expr
    ) => {{
        let call = $call;
        $crate::effect::Effect::Future(::std::boxed::Box::pin(async move {
            match call.await {
                ::std::result::Result::Ok($ok) => ::std::option::Option::Some($success_body),
                ::std::result::Result::Err($err) => ::std::option::Option::Some($error_body),
            }
        }))
    }};
}
