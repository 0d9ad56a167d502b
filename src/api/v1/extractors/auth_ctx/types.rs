/*
 * Responsibility
 * - Handler から見える「認証済みコンテキスト」の型
 * - middleware が検証して request extensions に格納し、handler はこの型だけを受け取る
 *
 * Notes
 * - Claims は安い方 (DB 確認なし)。ban/role の判断には使わない
 * - Confirmed は admin gate を通った時だけ存在する
 */

use crate::services::auth::{ConfirmedPrincipal, VerifiedClaims};

/// Identity from a verified session token. Provided by the general gate.
#[derive(Debug, Clone)]
pub struct Claims(pub VerifiedClaims);

/// Database-confirmed, non-banned admin. Provided by the admin gate.
#[derive(Debug, Clone)]
pub struct Confirmed(pub ConfirmedPrincipal);
