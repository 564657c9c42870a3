//! Top-level item and declaration-body parsing.
//!
//! Declaration bodies recognize known member productions (`state`,
//! `function`/`service` methods, `on` handlers, pipeline `stage`s, and
//! `key: expr` properties) until the closing brace. Anything else is a
//! syntax error in strict mode and skipped in lenient mode
//! (see [`crate::ParseOptions::lenient_declarations`]).

use omnix_lexer::token::TokenKind;
use omnix_types::ast::*;
use omnix_types::Span;

use crate::parser::{PResult, Parser};

impl Parser {
    /// Parse the whole token stream into a [`Program`].
    pub(crate) fn parse_program(&mut self) -> PResult<Program> {
        let start = self.current_span();
        let mut items = Vec::new();

        while !self.at_end() {
            let annotations = self.parse_annotations()?;
            if self.at_decl_start() {
                items.push(Item::Decl(self.parse_decl(annotations)?));
            } else if !annotations.is_empty() {
                return Err(self.error("declaration after annotation"));
            } else {
                items.push(Item::Stmt(self.parse_stmt()?));
            }
        }

        let span = start.merge(self.previous_span());
        Ok(Program { items, span })
    }

    /// `true` if the current token begins a declaration.
    fn at_decl_start(&self) -> bool {
        match self.peek_kind() {
            TokenKind::Consensus => self.peek_at(1) == &TokenKind::Cluster,
            TokenKind::Node
            | TokenKind::Function
            | TokenKind::Contract
            | TokenKind::Pipeline
            | TokenKind::Import
            | TokenKind::Export => true,
            _ => false,
        }
    }

    // ── Annotations ───────────────────────────────────────────────────────────

    /// Zero or more `@name(arg, key: expr, ...)` annotations.
    fn parse_annotations(&mut self) -> PResult<Vec<Annotation>> {
        let mut annotations = Vec::new();
        while self.check(&TokenKind::At) {
            let start = self.advance().span;
            let name = self.expect_name()?;
            let mut args = Vec::new();
            if self.eat(&TokenKind::LParen) {
                if !self.check(&TokenKind::RParen) {
                    loop {
                        args.push(self.parse_annotation_arg()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RParen)?;
            }
            let span = start.merge(self.previous_span());
            annotations.push(Annotation { name, args, span });
        }
        Ok(annotations)
    }

    /// One annotation argument: positional (`ethereum`) or named
    /// (`timeout: 5s`).
    fn parse_annotation_arg(&mut self) -> PResult<AnnotationArg> {
        let named = matches!(
            self.peek_kind(),
            TokenKind::Identifier(_) | TokenKind::TypeName(_) | TokenKind::Network(_)
        ) && self.peek_at(1) == &TokenKind::Colon;
        if named {
            let name = self.expect_name()?;
            self.expect(&TokenKind::Colon)?;
            let value = self.parse_expr()?;
            Ok(AnnotationArg {
                name: Some(name),
                value,
            })
        } else {
            let value = self.parse_expr()?;
            Ok(AnnotationArg { name: None, value })
        }
    }

    // ── Declarations ──────────────────────────────────────────────────────────

    fn parse_decl(&mut self, annotations: Vec<Annotation>) -> PResult<Decl> {
        match self.peek_kind() {
            TokenKind::Consensus => Ok(Decl::Cluster(self.parse_cluster(annotations)?)),
            TokenKind::Node => Ok(Decl::Node(self.parse_node(annotations)?)),
            TokenKind::Function => {
                let kw = self.advance().span;
                Ok(Decl::Function(self.parse_function(kw, annotations)?))
            }
            TokenKind::Contract => Ok(Decl::Contract(self.parse_contract(annotations)?)),
            TokenKind::Pipeline => Ok(Decl::Pipeline(self.parse_pipeline(annotations)?)),
            TokenKind::Import => self.parse_import(),
            TokenKind::Export => self.parse_export(),
            _ => Err(self.error("declaration")),
        }
    }

    /// `consensus cluster Name { replicas: 5  consensus: ...  service ... }`
    fn parse_cluster(&mut self, annotations: Vec<Annotation>) -> PResult<ClusterDecl> {
        let start = self.expect(&TokenKind::Consensus)?.span;
        self.expect(&TokenKind::Cluster)?;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LBrace)?;

        let mut properties = Vec::new();
        let mut state = Vec::new();
        let mut methods = Vec::new();
        let mut handlers = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            match self.peek_kind() {
                TokenKind::State => state.push(self.parse_state_decl()?),
                TokenKind::Function | TokenKind::Service => {
                    let kw = self.advance().span;
                    methods.push(self.parse_function(kw, Vec::new())?);
                }
                TokenKind::On => handlers.push(self.parse_event_handler()?),
                _ if self.at_property() => properties.push(self.parse_body_property()?),
                _ => self.skip_unknown_member("cluster member")?,
            }
        }

        self.expect(&TokenKind::RBrace)?;
        let span = start.merge(self.previous_span());
        Ok(ClusterDecl {
            name,
            annotations,
            properties,
            state,
            methods,
            handlers,
            span,
        })
    }

    /// `node Name { state ...; function ...; on event { } }`
    fn parse_node(&mut self, annotations: Vec<Annotation>) -> PResult<NodeDecl> {
        let start = self.expect(&TokenKind::Node)?.span;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LBrace)?;

        let mut properties = Vec::new();
        let mut state = Vec::new();
        let mut methods = Vec::new();
        let mut handlers = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            match self.peek_kind() {
                TokenKind::State => state.push(self.parse_state_decl()?),
                TokenKind::Function | TokenKind::Service => {
                    let kw = self.advance().span;
                    methods.push(self.parse_function(kw, Vec::new())?);
                }
                TokenKind::On => handlers.push(self.parse_event_handler()?),
                _ if self.at_property() => properties.push(self.parse_body_property()?),
                _ => self.skip_unknown_member("node member")?,
            }
        }

        self.expect(&TokenKind::RBrace)?;
        let span = start.merge(self.previous_span());
        Ok(NodeDecl {
            name,
            annotations,
            properties,
            state,
            methods,
            handlers,
            span,
        })
    }

    /// `contract Name { state ...; function ...; }`: chains come from a
    /// `@cross_chain(...)` annotation; without one the contract is bound
    /// to the single chain `local`.
    fn parse_contract(&mut self, annotations: Vec<Annotation>) -> PResult<ContractDecl> {
        let start = self.expect(&TokenKind::Contract)?.span;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LBrace)?;

        let mut state = Vec::new();
        let mut methods = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            match self.peek_kind() {
                TokenKind::State => state.push(self.parse_state_decl()?),
                TokenKind::Function | TokenKind::Service => {
                    let kw = self.advance().span;
                    methods.push(self.parse_function(kw, Vec::new())?);
                }
                _ => self.skip_unknown_member("contract member")?,
            }
        }

        self.expect(&TokenKind::RBrace)?;
        let span = start.merge(self.previous_span());
        let chains = chains_from_annotations(&annotations, start);
        Ok(ContractDecl {
            name,
            annotations,
            chains,
            state,
            methods,
            span,
        })
    }

    /// `pipeline Name { input: ...  stage clean { ... } }`
    fn parse_pipeline(&mut self, annotations: Vec<Annotation>) -> PResult<PipelineDecl> {
        let start = self.expect(&TokenKind::Pipeline)?.span;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LBrace)?;

        let mut properties = Vec::new();
        let mut stages = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            match self.peek_kind() {
                TokenKind::Stage => stages.push(self.parse_stage()?),
                _ if self.at_property() => properties.push(self.parse_body_property()?),
                _ => self.skip_unknown_member("pipeline member")?,
            }
        }

        self.expect(&TokenKind::RBrace)?;
        let span = start.merge(self.previous_span());
        Ok(PipelineDecl {
            name,
            annotations,
            properties,
            stages,
            span,
        })
    }

    /// `stage name { parallel: true  workers: 4  process: transform }`
    fn parse_stage(&mut self) -> PResult<StageDecl> {
        let start = self.expect(&TokenKind::Stage)?.span;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LBrace)?;

        let mut properties = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() {
            if self.at_property() {
                properties.push(self.parse_body_property()?);
            } else {
                self.skip_unknown_member("stage property")?;
            }
        }

        self.expect(&TokenKind::RBrace)?;
        let span = start.merge(self.previous_span());
        Ok(StageDecl {
            name,
            properties,
            span,
        })
    }

    /// `import analytics.metrics;`
    fn parse_import(&mut self) -> PResult<Decl> {
        let start = self.expect(&TokenKind::Import)?.span;
        let mut parts = vec![self.expect_name()?.name];
        while self.eat(&TokenKind::Dot) {
            parts.push(self.expect_name()?.name);
        }
        self.expect(&TokenKind::Semicolon)?;
        let span = start.merge(self.previous_span());
        Ok(Decl::Import(ImportDecl {
            path: parts.join("."),
            span,
        }))
    }

    /// `export <decl>`
    fn parse_export(&mut self) -> PResult<Decl> {
        let start = self.expect(&TokenKind::Export)?.span;
        let annotations = self.parse_annotations()?;
        if !self.at_decl_start() {
            return Err(self.error("declaration after export"));
        }
        let inner = self.parse_decl(annotations)?;
        let span = start.merge(self.previous_span());
        Ok(Decl::Export(ExportDecl {
            inner: Box::new(inner),
            span,
        }))
    }

    // ── Shared member productions ─────────────────────────────────────────────

    /// `state name: type = expr;`
    fn parse_state_decl(&mut self) -> PResult<StateDecl> {
        let start = self.expect(&TokenKind::State)?.span;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::Colon)?;
        let ty = self.parse_type()?;
        let init = if self.eat(&TokenKind::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(&TokenKind::Semicolon)?;
        let span = start.merge(self.previous_span());
        Ok(StateDecl {
            name,
            ty,
            init,
            span,
        })
    }

    /// Function or service method; the introducing keyword is consumed.
    pub(crate) fn parse_function(
        &mut self,
        kw_span: Span,
        annotations: Vec<Annotation>,
    ) -> PResult<FunctionDecl> {
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let pname = self.expect_identifier()?;
                let ty = if self.eat(&TokenKind::Colon) {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                let span = pname.span;
                params.push(Param {
                    name: pname,
                    ty,
                    span,
                });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        let return_ty = if self.eat(&TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        let span = kw_span.merge(self.previous_span());
        Ok(FunctionDecl {
            name,
            annotations,
            params,
            return_ty,
            body,
            span,
        })
    }

    /// `on peer_discovered { ... }`
    fn parse_event_handler(&mut self) -> PResult<EventHandler> {
        let start = self.expect(&TokenKind::On)?.span;
        let event = self.expect_identifier()?;
        let body = self.parse_block()?;
        let span = start.merge(self.previous_span());
        Ok(EventHandler { event, body, span })
    }

    /// A `key: expr` entry inside a declaration body, with an optional
    /// `,` or `;` separator.
    fn parse_body_property(&mut self) -> PResult<Property> {
        let key = self.expect_name()?;
        self.expect(&TokenKind::Colon)?;
        let value = self.parse_expr()?;
        self.eat_property_separator();
        Ok(Property { key, value })
    }

    /// Strict mode fails on an unrecognized declaration-body token;
    /// lenient mode skips it.
    fn skip_unknown_member(&mut self, expected: &str) -> PResult<()> {
        if self.options.lenient_declarations {
            self.advance();
            Ok(())
        } else {
            Err(self.error(expected))
        }
    }
}

/// Pull the ordered chain list out of a `@cross_chain(...)` annotation.
fn chains_from_annotations(annotations: &[Annotation], fallback: Span) -> Vec<Ident> {
    for annotation in annotations {
        if annotation.name.name != "cross_chain" {
            continue;
        }
        return annotation
            .args
            .iter()
            .filter_map(|arg| match &arg.value.kind {
                ExprKind::Str(s) => Some(Ident::new(s.clone(), arg.value.span)),
                ExprKind::Identifier(s) => Some(Ident::new(s.clone(), arg.value.span)),
                _ => None,
            })
            .collect();
    }
    vec![Ident::new("local", fallback)]
}
