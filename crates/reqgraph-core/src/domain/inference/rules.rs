//! Default classification rules
//!
//! Patterns cover Portuguese and English phrasing, since datasets carry both
//! the source user stories and their translations. Every target named here
//! is created by the reference seed.

use crate::domain::graph::NodeRef;
use crate::error::Result;

use super::rule::{Predicate, Rule, RuleSet};

const FUNCTIONAL: &str = r"\b(deve|deverá|devem)\s+(permitir|possibilitar|exibir|mostrar|cadastrar|gerar|enviar|autenticar|registrar|listar|calcular|notificar)\b|\bpermitir que\b|\bcomo (um |uma )?(usu[aá]rio|cliente|administrador)\b|\bpara que eu possa\b|\bi want to\b|\bas an? (user|customer|admin|administrator)\b";

const NON_FUNCTIONAL: &str = r"\b(desempenho|performance|tempo de resposta|response time|responder em|disponibilidade|availability|escalabilidade|scalability|confiabilidade|reliability|manutenibilidade|maintainability|portabilidade|portability)\b|\bmenos de \d+\s*(segundos?|ms|milissegundos)\b|\bwithin \d+\s*(seconds?|ms)\b";

const AUTHENTICATION: &str = r"\b(log[ -]?in|logar|autentica\w*|authenticat\w*|senhas?|passwords?|credencia\w*|credentials?|sign[ -]?in|2fa)\b";

const SECURITY: &str = r"\b(seguran[cç]a|security|criptograf\w*|encrypt\w*|permiss\w*|autoriza\w*|authori[sz]\w*|privacidade|privacy|lgpd|gdpr)\b";

const PERFORMANCE: &str = r"\b(desempenho|performance|tempo de resposta|response time|lat[eê]ncia|latency|throughput|responder em)\b|\bmenos de \d+\s*(segundos?|ms|milissegundos)\b|\bwithin \d+\s*(seconds?|ms)\b";

const USABILITY: &str = r"\b(usabilidade|usability|f[aá]cil de usar|easy to use|intuitiv\w*|acessibilidade|accessibility|amig[aá]vel|user[- ]friendly)\b";

const STAKEHOLDER: &str = r"\b(stakeholders?|partes interessadas|clientes?|customers?|gerentes?|managers?|administrador(es)?|administrators?)\b";

const USE_CASE_FLOW: &str = r"\b(cadastr\w*|registr\w*|gerar|emitir|consultar|listar|fluxo|caso de uso|use case|create|register|generate)\b";

const ACCEPTANCE_CRITERIA: &str = r"\b(dado|given|quando|when|ent[aã]o|then)\b";

/// Build the default rule table
pub fn default_rules() -> Result<RuleSet> {
    use crate::domain::graph::EntityKind::Requirement;
    use crate::domain::graph::RelationshipKind::{
        ElicitedBy, IsA, IsRelatedTo, SupportedBy, UsesTechnique,
    };

    let text = &["text"];
    let text_and_summary = &["text", "summary"];

    RuleSet::new(vec![
        Rule::new(
            "classify_functional",
            Requirement,
            Predicate::text(text, FUNCTIONAL),
            IsA,
            NodeRef::concept("C001"),
        )
        .with_description("Statements of system behaviour are functional requirements"),
        Rule::new(
            "classify_non_functional",
            Requirement,
            Predicate::text(text, NON_FUNCTIONAL),
            IsA,
            NodeRef::concept("C004"),
        )
        .with_description("Quality attributes make a requirement non-functional"),
        Rule::new(
            "relate_authentication",
            Requirement,
            Predicate::text(text_and_summary, AUTHENTICATION),
            IsRelatedTo,
            NodeRef::concept("C002"),
        )
        .with_description("Login, passwords and credentials relate to authentication"),
        Rule::new(
            "relate_security",
            Requirement,
            Predicate::text(text_and_summary, SECURITY),
            IsRelatedTo,
            NodeRef::concept("C005"),
        )
        .with_description("Access control, encryption and privacy relate to security"),
        Rule::new(
            "relate_performance",
            Requirement,
            Predicate::text(text_and_summary, PERFORMANCE),
            IsRelatedTo,
            NodeRef::concept("C006"),
        )
        .with_description("Response times and throughput relate to performance"),
        Rule::new(
            "relate_usability",
            Requirement,
            Predicate::text(text_and_summary, USABILITY),
            IsRelatedTo,
            NodeRef::concept("C007"),
        )
        .with_description("Ease of use and accessibility relate to usability"),
        Rule::new(
            "relate_stakeholder",
            Requirement,
            Predicate::text(text, STAKEHOLDER),
            IsRelatedTo,
            NodeRef::concept("C003"),
        )
        .with_description("Named roles point at stakeholders"),
        Rule::new(
            "functional_uses_interviews",
            Requirement,
            Predicate::has_edge(IsA, NodeRef::concept("C001")),
            UsesTechnique,
            NodeRef::technique("TECH001"),
        )
        .with_description("Functional requirements are elicited through interviews")
        .depends_on("classify_functional"),
        Rule::new(
            "functional_uses_use_cases",
            Requirement,
            Predicate::All(vec![
                Predicate::has_edge(IsA, NodeRef::concept("C001")),
                Predicate::text(text, USE_CASE_FLOW),
            ]),
            UsesTechnique,
            NodeRef::technique("TECH002"),
        )
        .with_description("Functional requirements describing a flow are specified with use cases")
        .depends_on("classify_functional"),
        Rule::new(
            "usability_elicited_by_prototyping",
            Requirement,
            Predicate::has_edge(IsRelatedTo, NodeRef::concept("C007")),
            ElicitedBy,
            NodeRef::technique("TECH003"),
        )
        .with_description("Usability concerns are elicited with prototypes")
        .depends_on("relate_usability"),
        Rule::new(
            "stakeholder_elicited_by_interviews",
            Requirement,
            Predicate::has_edge(IsRelatedTo, NodeRef::concept("C003")),
            ElicitedBy,
            NodeRef::technique("TECH001"),
        )
        .with_description("Requirements naming stakeholders are elicited by interviewing them")
        .depends_on("relate_stakeholder"),
        Rule::new(
            "acceptance_criteria_supported_by_verifiability",
            Requirement,
            Predicate::text(&["summary"], ACCEPTANCE_CRITERIA),
            SupportedBy,
            NodeRef::instruction("INST001"),
        )
        .with_description("Requirements with acceptance criteria follow the clear and verifiable guideline"),
        Rule::new(
            "non_functional_supported_by_measurability",
            Requirement,
            Predicate::has_edge(IsA, NodeRef::concept("C004")),
            SupportedBy,
            NodeRef::instruction("INST004"),
        )
        .with_description("Non-functional requirements follow the measurability guideline")
        .depends_on("classify_non_functional"),
    ])
}
