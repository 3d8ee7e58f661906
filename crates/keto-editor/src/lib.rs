// SPDX-License-Identifier: MIT
//
// keto-editor — the editor session on top of keto-term.
//
// For now the "editor" is a screen of placeholder rows that redraws after
// every keypress and quits on Ctrl-Q. The session owns the raw-mode
// lifetime and the quit decision; a document, cursor and file I/O would
// plug in as consumers of the same render and key primitives.

pub mod inspect;
pub mod key;
pub mod session;
