//! Classification of the tokens inside a structured callback.
//!
//! `[callback(), piece; piece, ...]` carries `;`-separated pieces. A piece whose first
//! comma-separated element is an event or a port is a token list (`Evt.go, extra`); any
//! other piece is one literal token, commas included, so embedded code keeps its commas.

use proc_macro2::TokenStream;
use quote::quote;

use super::ident;
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::error::{CompileError, Result};
use crate::model::DesignModel;
use crate::section::starts_with_code_keyword;
use crate::validate::lookup_event;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Qualified `Group.event`, and whether the token had to be qualified.
    Event { qualified: String, rewritten: bool },
    Port(String),
    Literal,
}

/// Tells events and ports apart from literal code. A name found in several groups is an
/// error, never code.
pub fn classify(model: &DesignModel, context: &str, token: &str) -> Result<TokenKind> {
    let token = token.trim();
    match lookup_event(&model.groups, context, token) {
        Ok((qualified, rewritten)) => {
            return Ok(TokenKind::Event {
                qualified,
                rewritten,
            });
        }
        Err(CompileError::UnresolvedReference { .. }) => {}
        Err(e) => return Err(e),
    }
    if model.port(token).is_some_and(|p| !p.disabled) {
        return Ok(TokenKind::Port(token.to_string()));
    }
    Ok(TokenKind::Literal)
}

/// Expands the `;`-separated pieces into tokens.
pub fn split_tokens(
    model: &DesignModel,
    context: &str,
    pieces: &[String],
) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    for piece in pieces {
        let first = piece.split(',').next().unwrap_or_default();
        if classify(model, context, first)? == TokenKind::Literal {
            tokens.push(piece.trim().to_string());
        } else {
            tokens.extend(
                piece
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string),
            );
        }
    }
    Ok(tokens)
}

/// `Group.event` as the path of the generated associated constant.
pub fn event_path(section: &str, qualified: &str) -> Result<TokenStream> {
    let (group, event) = qualified
        .split_once('.')
        .ok_or_else(|| CompileError::UnresolvedReference {
            context: section.to_string(),
            kind: "event",
            reference: qualified.to_string(),
        })?;
    let group = ident(section, group)?;
    let event = ident(section, event)?;
    Ok(quote! { #group::#event })
}

/// Event data: nothing, one expression, or a tuple. Tokens that aren't expressions become
/// string literals.
pub fn event_data(tokens: &[String]) -> TokenStream {
    let exprs: Vec<TokenStream> = tokens
        .iter()
        .map(|token| match syn::parse_str::<syn::Expr>(token) {
            Ok(expr) => quote! { #expr },
            Err(_) => {
                let text = token.as_str();
                quote! { #text }
            }
        })
        .collect();
    match exprs.as_slice() {
        [] => quote! { None },
        [single] => quote! { Some(EventData::from(#single)) },
        many => quote! { Some(EventData::from((#(#many),*))) },
    }
}

/// Turns a literal token into statements.
pub fn literal_statements(
    callback: &str,
    token: &str,
    limit_actions: bool,
    diag: &mut Diagnostics,
) -> Result<Vec<syn::Stmt>> {
    let reject = |reason: String| CompileError::EmbeddedCode {
        callback: callback.to_string(),
        code: token.to_string(),
        reason,
    };
    if limit_actions {
        return Err(reject(
            "literal code is not allowed while LimitAction is set".into(),
        ));
    }

    let mut code = token.trim().to_string();
    if code.starts_with("send_event(") {
        code.insert_str(0, "param.");
    }
    if !code.ends_with(';') && !code.ends_with('}') {
        code.push(';');
    }
    let block: syn::Block = syn::parse_str(&format!("{{ {code} }}"))
        .map_err(|e| reject(e.to_string()))?;

    if !starts_with_code_keyword(&code) {
        diag.warn(
            WarningKind::EmbeddedCode,
            format!("{callback}: '{}' copied as embedded code", token.trim()),
        );
    }
    Ok(block.stmts)
}
