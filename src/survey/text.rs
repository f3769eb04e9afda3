//! Localized prompt strings and option sets.
//!
//! Both tables are total: every `(key, lang)` pair resolves through an
//! exhaustive `match`, so a missing translation is a compile error rather
//! than a runtime lookup failure. Prompts use Telegram HTML markup.

use super::lang::Lang;

/// Every user-facing string the survey sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextKey {
    ChooseLanguage,
    StartHint,
    /// The language's own name, used on the language buttons.
    LanguageName,
    Welcome,
    Cancelled,
    QInterest,
    QValuesOpen,
    QValuesTap,
    QPains,
    QExpectations,
    QContact,
    Thanks,
    OpenVariants,
    Done,
    SavedChoice,
    CancelButton,
    ShareContact,
    NeedText,
    OtherButton,
    OtherPainsPrompt,
    OtherExpectationsPrompt,
    OtherLabel,
    SaveFailed,
    SummaryTitle,
    SummaryInterest,
    SummaryValues,
    SummaryPains,
    SummaryExpectations,
    SummaryContact,
}

impl TextKey {
    pub const ALL: [TextKey; 29] = [
        TextKey::ChooseLanguage,
        TextKey::StartHint,
        TextKey::LanguageName,
        TextKey::Welcome,
        TextKey::Cancelled,
        TextKey::QInterest,
        TextKey::QValuesOpen,
        TextKey::QValuesTap,
        TextKey::QPains,
        TextKey::QExpectations,
        TextKey::QContact,
        TextKey::Thanks,
        TextKey::OpenVariants,
        TextKey::Done,
        TextKey::SavedChoice,
        TextKey::CancelButton,
        TextKey::ShareContact,
        TextKey::NeedText,
        TextKey::OtherButton,
        TextKey::OtherPainsPrompt,
        TextKey::OtherExpectationsPrompt,
        TextKey::OtherLabel,
        TextKey::SaveFailed,
        TextKey::SummaryTitle,
        TextKey::SummaryInterest,
        TextKey::SummaryValues,
        TextKey::SummaryPains,
        TextKey::SummaryExpectations,
        TextKey::SummaryContact,
    ];
}

/// Look up a localized string.
pub fn text(key: TextKey, lang: Lang) -> &'static str {
    use Lang::{Ru, Uz};
    use TextKey::*;

    match (key, lang) {
        (ChooseLanguage, Ru) => "Выберите язык ⤵️",
        (ChooseLanguage, Uz) => "Tilni tanlang ⤵️",

        (StartHint, Ru) => "Чтобы пройти опрос, нажмите /start",
        (StartHint, Uz) => "So‘rovnomani boshlash uchun /start ni bosing",

        (LanguageName, Ru) => "Русский",
        (LanguageName, Uz) => "O‘zbekcha",

        (Welcome, Ru) => concat!(
            "<b>Мы — TripleA Travel</b> (стартап из Узбекистана). ",
            "Делаем <b>Telegram-агрегатор заявок</b> для турфирм: единая лента лидов, быстрые шаблоны ответов, ",
            "онлайн-оплата и базовая аналитика. Ищем 10–15 пилотных агентств, чтобы собрать обратную связь и ",
            "запустить бесплатный MVP на месяц.\n\n",
            "Короткий опрос (5 вопросов) — интерес, боли, ожидания. Можно остановиться /cancel.\n\n",
            "<b>1/5 — Интересен ли агрегатор в Telegram?</b>",
        ),
        (Welcome, Uz) => concat!(
            "<b>Biz — TripleA Travel</b> (O‘zbekiston startapi). ",
            "Turfirmalar uchun <b>Telegramda arizalar agregatori</b>: yagona lead-lenta, tezkor javob shablonlari, ",
            "onlayn to‘lov va oddiy analitika. Pilot uchun 10–15 ta agentlik izlaymiz va 1 oylik bepul MVP ishga tushiramiz.\n\n",
            "Qisqa so‘rov (5 ta savol): qiziqish, og‘riqlar, kutilyotgan natijalar. /cancel bilan to‘xtatish mumkin.\n\n",
            "<b>1/5 — Telegramdagi agregator sizga qiziqmi?</b>",
        ),

        (Cancelled, Ru) => "Ок, опрос отменён. Можно перезапустить через /start.",
        (Cancelled, Uz) => "Yaxshi, so‘rovnoma bekor qilindi. /start bilan qayta boshlashingiz mumkin.",

        (QInterest, Ru) => "<b>1/5 — Интересен ли агрегатор в Telegram?</b>",
        (QInterest, Uz) => "<b>1/5 — Telegramdagi agregator sizga qiziqmi?</b>",

        (QValuesOpen, Ru) => {
            "<b>2/5 — Что важнее всего в агрегаторе?</b>\nВыберите вариант(ы) и нажмите «Готово»."
        }
        (QValuesOpen, Uz) => {
            "<b>2/5 — Agregatorda eng muhim narsa nima?</b>\nVariant(lar)ni tanlab «Tayyor» tugmasini bosing."
        }

        (QValuesTap, Ru) => {
            "<b>2/5 — Что важнее всего в агрегаторе?</b>\nТапайте по вариантам, затем «Готово»."
        }
        (QValuesTap, Uz) => {
            "<b>2/5 — Agregatorda eng muhim narsa nima?</b>\nVariantlarga bosing, so‘ng «Tayyor»."
        }

        (QPains, Ru) => {
            "<b>3/5 — Какие главные боли/узкие места сейчас?</b>\nОтметьте варианты или напишите свой, затем «Готово»."
        }
        (QPains, Uz) => {
            "<b>3/5 — Hozirgi asosiy muammolar/tor joylar nimalar?</b>\nVariantlarni belgilang yoki o‘zingiznikini yozing, so‘ng «Tayyor»."
        }

        (QExpectations, Ru) => {
            "<b>4/5 — Что для вас будет успехом через месяц использования?</b>\nОтметьте варианты или напишите свой, затем «Готово»."
        }
        (QExpectations, Uz) => {
            "<b>4/5 — Bir oyda qanday natija muvaffaqiyat deb hisoblaysiz?</b>\nVariantlarni belgilang yoki o‘zingiznikini yozing, so‘ng «Tayyor»."
        }

        (QContact, Ru) => "<b>5/5 — Контакт для связи</b> (телефон или @username)",
        (QContact, Uz) => "<b>5/5 — Aloqa uchun kontakt</b> (telefon yoki @username)",

        (Thanks, Ru) => "Спасибо! Анкета сохранена. Мы свяжемся с вами для демо 🚀",
        (Thanks, Uz) => "Rahmat! So‘rovnoma saqlandi. Demosi uchun siz bilan bog‘lanamiz 🚀",

        (OpenVariants, Ru) => "Открыть варианты",
        (OpenVariants, Uz) => "Variantlarni ochish",

        (Done, Ru) => "✅ Готово",
        (Done, Uz) => "✅ Tayyor",

        (SavedChoice, Ru) => "Выбор сохранён",
        (SavedChoice, Uz) => "Tanlov saqlandi",

        (CancelButton, Ru) => "Отменить",
        (CancelButton, Uz) => "Bekor qilish",

        (ShareContact, Ru) => "📱 Поделиться телефоном",
        (ShareContact, Uz) => "📱 Telefonni ulashish",

        (NeedText, Ru) => "Пожалуйста, введите текст (не стикер/фото).",
        (NeedText, Uz) => "Iltimos, matn yuboring (stiker/foto emas).",

        (OtherButton, Ru) => "Другое ✍️",
        (OtherButton, Uz) => "Boshqa ✍️",

        (OtherPainsPrompt, Ru) => "Опишите кратко «Другое»:",
        (OtherPainsPrompt, Uz) => "Qisqa «Boshqa» yozing:",

        (OtherExpectationsPrompt, Ru) => "Опишите «Другое» ожидание:",
        (OtherExpectationsPrompt, Uz) => "«Boshqa» kutilmalarni yozing:",

        (OtherLabel, Ru) => "Другое",
        (OtherLabel, Uz) => "Boshqa",

        (SaveFailed, Ru) => "⚠️ Ошибка сохранения в таблицу. Попробуйте позже.",
        (SaveFailed, Uz) => "⚠️ Jadvalga saqlashda xatolik. Keyinroq urinib ko‘ring.",

        (SummaryTitle, Ru) => "Новая анкета",
        (SummaryTitle, Uz) => "Yangi so‘rovnoma",

        (SummaryInterest, Ru) => "Интерес",
        (SummaryInterest, Uz) => "Qiziqish",

        (SummaryValues, Ru) => "Ценности",
        (SummaryValues, Uz) => "Qadriyatlar",

        (SummaryPains, Ru) => "Боли",
        (SummaryPains, Uz) => "Muammolar",

        (SummaryExpectations, Ru) => "Ожидания",
        (SummaryExpectations, Uz) => "Kutilmalar",

        (SummaryContact, Ru) => "Контакт",
        (SummaryContact, Uz) => "Kontakt",
    }
}

/// Both languages' strings for `key`, one per line. Used before a
/// language has been chosen.
pub fn bilingual(key: TextKey) -> String {
    Lang::ALL
        .iter()
        .map(|lang| text(key, *lang))
        .collect::<Vec<_>>()
        .join("\n")
}

/// An enumerated, localized list of choices. Answers refer to options by
/// index, never by label, since labels differ across languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionSet {
    Interest,
    Values,
    Pains,
    Expectations,
}

impl OptionSet {
    pub const ALL: [OptionSet; 4] = [
        OptionSet::Interest,
        OptionSet::Values,
        OptionSet::Pains,
        OptionSet::Expectations,
    ];

    /// Labels for this set in `lang`, in index order.
    pub fn labels(&self, lang: Lang) -> &'static [&'static str] {
        match (self, lang) {
            (Self::Interest, Lang::Ru) => &["Да, очень", "Возможно", "Нет"],
            (Self::Interest, Lang::Uz) => &["Ha, juda qiziq", "Balki", "Yo‘q"],

            (Self::Values, Lang::Ru) => &[
                "Больше клиентов",
                "Управление турами",
                "Онлайн-оплата",
                "Отчёты и аналитика",
                "Отзывы клиентов",
            ],
            (Self::Values, Lang::Uz) => &[
                "Ko‘proq mijozlar",
                "Turlarni boshqarish",
                "Onlayn to‘lov",
                "Hisobot va analitika",
                "Mijozlar fikrlari",
            ],

            (Self::Pains, Lang::Ru) => &[
                "Мало заявок",
                "Дорогие лиды",
                "Долгие ответы менеджеров",
                "Хаос в переписках",
                "Нет онлайн-оплаты",
                "Нет аналитики",
            ],
            (Self::Pains, Lang::Uz) => &[
                "Arizalar kam",
                "Lidlar qimmat",
                "Menejer javobi sekin",
                "Chatlar tartibsiz",
                "Onlayn to‘lov yo‘q",
                "Analitika yo‘q",
            ],

            (Self::Expectations, Lang::Ru) => &[
                "+30% лидов/мес",
                "Сократить время ответа < 5 мин",
                "Единая лента без хаоса",
                "Онлайн-оплата работает",
                "Базовые отчёты/дашборд",
            ],
            (Self::Expectations, Lang::Uz) => &[
                "Oyiga +30% lid",
                "Javob vaqti < 5 daqiqa",
                "Yagona lenta, tartib",
                "Onlayn to‘lov ishlaydi",
                "Oddiy hisobot/dashbord",
            ],
        }
    }

    /// Number of options (identical across languages).
    pub fn len(&self) -> usize {
        self.labels(Lang::default()).len()
    }

    /// Position of `label` in this set, exact and case-sensitive.
    pub fn position(&self, label: &str, lang: Lang) -> Option<usize> {
        self.labels(lang).iter().position(|l| *l == label)
    }
}
